//! Deterministic cleanup of vision-model transcriptions.
//!
//! Models sometimes ignore the "plain text only" rule: they wrap output in
//! code fences, use CRLF, pad lines, or emit zero-width characters copied
//! from the page. Each rule below is a pure `&str -> String` pass so they can
//! be tested and reordered independently.
//!
//! Order matters: fences are stripped before line endings are normalised so
//! the fence pattern sees the raw reply, and the sentinel check runs last on
//! fully cleaned text.

use crate::prompts::NO_TEXT_SENTINEL;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule. Returns an empty string for a blank page.
pub fn clean_transcript(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    drop_sentinel(s.trim())
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\r?\n(.*?)\r?\n```\s*$").expect("valid fence regex")
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip invisible Unicode ──────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").expect("valid regex")
});

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").into_owned()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse runs of blank lines ─────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 6: Blank-page sentinel ──────────────────────────────────────────

fn drop_sentinel(input: &str) -> String {
    if input.eq_ignore_ascii_case(NO_TEXT_SENTINEL) {
        String::new()
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fences_are_stripped() {
        let raw = "```text\nInvoice 42\nTotal: 10\n```";
        assert_eq!(clean_transcript(raw), "Invoice 42\nTotal: 10");
    }

    #[test]
    fn unfenced_text_is_kept() {
        assert_eq!(clean_transcript("just text"), "just text");
    }

    #[test]
    fn crlf_and_trailing_spaces_are_normalised() {
        assert_eq!(clean_transcript("a  \r\nb\t\r\n"), "a\nb");
    }

    #[test]
    fn blank_runs_collapse_to_one_empty_line() {
        assert_eq!(clean_transcript("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn invisible_chars_are_removed() {
        assert_eq!(clean_transcript("\u{FEFF}he\u{200B}llo"), "hello");
    }

    #[test]
    fn sentinel_means_empty_page() {
        assert_eq!(clean_transcript("  [NO TEXT]\n"), "");
        assert_eq!(clean_transcript("[no text]"), "");
        assert_eq!(clean_transcript("```\n[NO TEXT]\n```"), "");
    }
}
