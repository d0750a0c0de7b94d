//! Prompts for vision-model OCR.
//!
//! Keeping prompts here means the transcription behaviour can change without
//! touching the retry logic in [`crate::ocr::vision`], and tests can inspect
//! them directly.
//!
//! Callers can override the default via [`crate::config::OcrConfig::system_prompt`].

/// Reply the model gives for a page with no legible text.
///
/// The cleanup pass turns it into an empty page so it never reaches the DOCX.
pub const NO_TEXT_SENTINEL: &str = "[NO TEXT]";

/// Default system prompt for transcribing one scanned page.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. You receive an image of one scanned document page and return its text.

Rules:

1. Transcribe ALL legible text exactly as written. Do not summarise, translate or correct wording.
2. Follow the human reading order: top to bottom, and column by column for multi-column layouts.
3. Put each line of the page on its own line. Separate paragraphs with one blank line.
4. For tables, write each row on one line with cells separated by " | ".
5. Skip page numbers, running headers and footers, watermarks and decorative elements.
6. Output plain text only: no Markdown, no code fences, no commentary.
7. If the page contains no legible text, reply with exactly: [NO TEXT]"#;

/// User-turn text sent alongside the page image.
pub fn page_instruction(page_num: usize, total_pages: usize) -> String {
    format!("Page {page_num} of {total_pages}. Transcribe the text.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_sentinel() {
        assert!(OCR_SYSTEM_PROMPT.contains(NO_TEXT_SENTINEL));
    }

    #[test]
    fn instruction_names_page() {
        assert_eq!(page_instruction(2, 5), "Page 2 of 5. Transcribe the text.");
    }
}
