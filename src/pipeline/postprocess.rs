//! Post-processing: deterministic cleanup of generated narration.
//!
//! ## Why is post-processing necessary?
//!
//! The narration goes straight to a text-to-speech presenter, which reads
//! every character it is given. Even well-prompted models sometimes return
//! text that is fine on screen but wrong out loud:
//!
//! - a ` ``` ` fence around the whole answer
//! - `## Headings`, `- bullets` or `**emphasis**`
//! - `[pause]` or `(smiles)` stage directions
//! - a `Narrator:` label in front of the script
//!
//! These rules strip that markup without touching the words. Each rule is a
//! pure `&str → String` function and is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Remove speaker labels at the start of a line
/// 4. Remove heading and list markers
/// 5. Unwrap emphasis markers
/// 6. Remove bracketed stage directions
/// 7. Strip invisible Unicode
/// 8. Tidy whitespace: trim lines, collapse blank runs, trim the ends
pub fn clean_narration(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_speaker_labels(&s);
    let s = remove_line_markers(&s);
    let s = unwrap_emphasis(&s);
    let s = remove_stage_directions(&s);
    let s = remove_invisible_chars(&s);
    tidy_whitespace(&s)
}

// ── Rule 1: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Speaker labels ───────────────────────────────────────────────────

static RE_SPEAKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*\**(narrator|speaker|host|presenter|voice ?over|vo)\**\s*:\**\s*").unwrap()
});

fn remove_speaker_labels(input: &str) -> String {
    RE_SPEAKER.replace_all(input, "").to_string()
}

// ── Rule 4: Heading and list markers ─────────────────────────────────────────

static RE_LINE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:#{1,6}|[-*•+]|\d{1,3}[.)])[ \t]+").unwrap());

fn remove_line_markers(input: &str) -> String {
    RE_LINE_MARKER.replace_all(input, "").to_string()
}

// ── Rule 5: Emphasis ─────────────────────────────────────────────────────────

static RE_STRONG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").unwrap());
static RE_EM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());

fn unwrap_emphasis(input: &str) -> String {
    let s = RE_STRONG.replace_all(input, "$1$2");
    RE_EM.replace_all(&s, "$1").to_string()
}

// ── Rule 6: Stage directions ─────────────────────────────────────────────────

static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]\n]*\]").unwrap());
static RE_PAREN_DIRECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\((?:[^)\n]*\b(?:pause|pauses|smiles?|laughs?|music|beat|gestures?|on screen|cut to)\b[^)\n]*)\)",
    )
    .unwrap()
});

fn remove_stage_directions(input: &str) -> String {
    let s = RE_BRACKETED.replace_all(input, "");
    RE_PAREN_DIRECTION.replace_all(&s, "").to_string()
}

// ── Rule 7: Invisible Unicode ────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}' | '\u{2060}'
            )
        })
        .collect()
}

// ── Rule 8: Whitespace ───────────────────────────────────────────────────────

static RE_INNER_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r" +([.,!?;:])").unwrap());
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn tidy_whitespace(input: &str) -> String {
    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            let s = RE_INNER_SPACES.replace_all(line.trim(), " ");
            RE_SPACE_BEFORE_PUNCT.replace_all(&s, "$1").to_string()
        })
        .collect();
    let joined = lines.join("\n");
    RE_BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}
