//! Text extraction: the full document text and its page count.
//!
//! Pages are joined with a form feed (`\x0c`) so the splitter can recover
//! page boundaries later. Whitespace is normalised before returning.

use crate::error::Pdf2VideoError;
use crate::output::DocumentInfo;
use crate::pipeline::rasterize::bind_pdfium;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

/// Marker placed between the text of consecutive pages.
pub const PAGE_BREAK: char = '\x0c';

/// Output of a [`TextExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub full_text: String,
    pub page_count: usize,
}

/// Pulls text out of document bytes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &[u8]) -> Result<ExtractedText, Pdf2VideoError>;
}

/// pdfium-backed [`TextExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumTextExtractor;

#[async_trait]
impl TextExtractor for PdfiumTextExtractor {
    async fn extract(&self, document: &[u8]) -> Result<ExtractedText, Pdf2VideoError> {
        let bytes = document.to_vec();
        let (pages, page_count) = tokio::task::spawn_blocking(move || extract_blocking(&bytes))
            .await
            .map_err(|e| Pdf2VideoError::Internal(format!("Extract task panicked: {}", e)))??;

        let joined = pages.join(&PAGE_BREAK.to_string());
        let full_text = clean_text(&joined);
        if full_text.trim_matches(|c: char| c.is_whitespace()).is_empty() {
            return Err(Pdf2VideoError::ScannedDocumentNoText);
        }
        info!(
            "Extracted {} characters from {} pages",
            full_text.chars().count(),
            page_count
        );
        Ok(ExtractedText {
            full_text,
            page_count,
        })
    }
}

/// Page count and extracted character count, without failing on image-only
/// documents.
pub async fn document_info(document: &[u8]) -> Result<DocumentInfo, Pdf2VideoError> {
    let bytes = document.to_vec();
    let (pages, page_count) = tokio::task::spawn_blocking(move || extract_blocking(&bytes))
        .await
        .map_err(|e| Pdf2VideoError::Internal(format!("Extract task panicked: {}", e)))??;
    let text = clean_text(&pages.join(&PAGE_BREAK.to_string()));
    Ok(DocumentInfo {
        page_count,
        character_count: text.chars().filter(|c| *c != PAGE_BREAK).count(),
    })
}

fn extract_blocking(bytes: &[u8]) -> Result<(Vec<String>, usize), Pdf2VideoError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| Pdf2VideoError::UnsupportedDocument {
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    if page_count == 0 {
        return Err(Pdf2VideoError::EmptyDocument);
    }

    let mut texts = Vec::with_capacity(page_count);
    for (idx, page) in pages.iter().enumerate() {
        let text = match page.text() {
            Ok(t) => t.all(),
            Err(e) => {
                debug!("Page {}: no text layer ({:?})", idx + 1, e);
                String::new()
            }
        };
        texts.push(text);
    }
    Ok((texts, page_count))
}

static CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b\x0d-\x1f\x7f]").expect("valid regex"));
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Normalise extracted text.
///
/// Control characters other than newline, tab and the page break become
/// spaces, runs of blanks collapse to one space and three or more newlines
/// collapse to two.
pub fn clean_text(raw: &str) -> String {
    let s = CONTROL.replace_all(raw, " ");
    let s = SPACES.replace_all(&s, " ");
    let s = BLANK_LINES.replace_all(&s, "\n\n");
    s.trim_matches(|c: char| c == ' ' || c == '\n' || c == '\t')
        .to_string()
}
