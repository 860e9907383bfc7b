//! Prompts for narration script generation.
//!
//! Centralising every prompt here means a change in speaking style is made
//! in exactly one place, and unit tests can inspect the prompts without a
//! live LLM.
//!
//! Two families:
//!
//! * **Summary**: one script for the whole document, with a tone and a
//!   target duration.
//! * **Page by page**: an intro for the whole document, then one short
//!   narration per page that plays over that page's image.

use crate::config::Tone;

/// Speaking rate used for every length estimate.
pub const WORDS_PER_MINUTE: u32 = 150;

/// Longest source text sent in one request, in characters.
pub const MAX_SOURCE_CHARS: usize = 50_000;

/// System prompt for summary scripts.
///
/// `{tone}` and `{seconds}` are substituted by [`summary_system_prompt`].
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are a professional video script writer. Convert written document content into a natural, engaging spoken-word script for a talking-head video.

RULES:
1. Write in the first person, speaking directly to the viewer.
2. Use a {tone} tone.
3. Target approximately {seconds} seconds of speaking time, at about 150 words per minute.
4. Open with a brief hook. Do NOT start with "Hello" or "Welcome".
5. Summarise the key points. Do not try to cover every detail.
6. Use natural spoken transitions.
7. End with a clear conclusion or call to action.
8. Do NOT include stage directions, speaker labels, timestamps or formatting.
9. Do NOT use markdown, headings, bullet points or special characters.
10. Output ONLY the words to be spoken.
11. Keep sentences short; this will be heard, not read."#;

/// System prompt shared by the intro and per-page scripts.
pub const PAGE_SYSTEM_PROMPT: &str = r#"You are narrating a document for a video. The viewer sees each page on screen while a presenter talks over it in a small window.

RULES:
1. Speak in the first person, directly to the viewer, in a clear professional tone.
2. Explain what matters on the page; do not read it out word for word.
3. Keep each page narration between 30 and 60 seconds (75 to 150 words).
4. Never mention page numbers, slides or "this document" more than once.
5. Do NOT include stage directions, speaker labels, timestamps or formatting.
6. Do NOT use markdown, headings, bullet points or special characters.
7. Output ONLY the words to be spoken."#;

/// Fill the summary system prompt.
pub fn summary_system_prompt(tone: Tone, seconds: u32) -> String {
    SUMMARY_SYSTEM_PROMPT
        .replace("{tone}", &tone.to_string())
        .replace("{seconds}", &seconds.to_string())
}

/// Words that fill `seconds` at [`WORDS_PER_MINUTE`].
pub fn target_word_count(seconds: u32) -> u32 {
    ((seconds as f64 / 60.0) * WORDS_PER_MINUTE as f64).round() as u32
}

/// Cut `text` to at most [`MAX_SOURCE_CHARS`] characters.
pub fn truncate_source(text: &str) -> &str {
    match text.char_indices().nth(MAX_SOURCE_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// User message for a summary script.
pub fn summary_user_message(text: &str, tone: Tone, seconds: u32) -> String {
    format!(
        "Convert the following document content into a video script.\n\n\
         Tone: {tone}\n\
         Target duration: {seconds} seconds (~{} words)\n\n\
         DOCUMENT CONTENT:\n{}",
        target_word_count(seconds),
        truncate_source(text)
    )
}

/// User message for the intro segment.
pub fn intro_user_message(full_text: &str, page_count: usize) -> String {
    format!(
        "Write a 20 to 30 second introduction (50 to 75 words) for a video that walks \
         through the following {page_count}-page document. Say what it is about and why \
         it is worth watching. Do not describe individual pages.\n\n\
         DOCUMENT CONTENT:\n{}",
        truncate_source(full_text)
    )
}

/// User message for one page.
pub fn page_user_message(page_num: usize, page_count: usize, page_text: &str) -> String {
    if page_text.trim().is_empty() {
        return format!(
            "Page {page_num} of {page_count} has no readable text (it is probably a figure \
             or a blank page). Write one or two sentences that keep the viewer oriented \
             and lead on to the next page."
        );
    }
    format!(
        "Narrate page {page_num} of {page_count}. The page text follows.\n\n\
         PAGE CONTENT:\n{}",
        truncate_source(page_text)
    )
}
