//! Per-page text splitting.
//!
//! Narration is generated page by page, so the extracted text has to be cut
//! back into one segment per page. Three strategies, tried in order:
//!
//! 1. **Page breaks**: split on form feeds. Used when that yields exactly
//!    `page_count` segments.
//! 2. **Paragraphs**: split on blank lines and deal the paragraphs out over
//!    `page_count` segments, earlier segments taking the remainder. Used when
//!    there are at least `page_count` paragraphs.
//! 3. **Whole document**: one segment holding all the text.

use crate::pipeline::extract::PAGE_BREAK;
use once_cell::sync::Lazy;
use regex::Regex;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

/// Split `full_text` into per-page segments. See the module docs.
///
/// Segment `i` belongs to page `i + 1` whenever the result has `page_count`
/// entries. A page with no text keeps an empty segment so positions line up.
pub fn split_text_by_page(full_text: &str, page_count: usize) -> Vec<String> {
    if page_count == 0 {
        return vec![full_text.trim().to_string()];
    }

    let by_marker: Vec<&str> = full_text.split(PAGE_BREAK).collect();
    if by_marker.len() == page_count {
        return by_marker.iter().map(|s| s.trim().to_string()).collect();
    }

    let paragraphs: Vec<&str> = PARAGRAPH_BREAK
        .split(full_text)
        .map(|p| p.trim_matches(|c: char| c.is_whitespace() || c == PAGE_BREAK))
        .filter(|p| !p.is_empty())
        .collect();
    if paragraphs.len() >= page_count {
        return distribute(&paragraphs, page_count);
    }

    vec![full_text.trim().to_string()]
}

/// Deal `items` into `n` contiguous groups whose sizes differ by at most one.
fn distribute(items: &[&str], n: usize) -> Vec<String> {
    let base = items.len() / n;
    let extra = items.len() % n;
    let mut out = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let len = base + usize::from(i < extra);
        out.push(items[start..start + len].join("\n\n"));
        start += len;
    }
    out
}
