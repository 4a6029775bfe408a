//! Post-processing: deterministic cleanup of raw OCR output.
//!
//! Tesseract ends every page with a form feed and may emit CRLF line
//! endings. Both are removed and the page is trimmed; nothing else changes.
//! Interior blank lines stay as recognised because the name heuristic in
//! [`crate::fields`] counts lines from the top of the document.

/// Apply all cleanup rules to one page of OCR text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Strip form feeds (tesseract's page terminator)
/// 3. Trim leading and trailing whitespace of the whole page
///
/// A page that is blank after cleanup becomes the empty string.
pub fn clean_page_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_form_feeds(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip form feeds ─────────────────────────────────────────────────

fn strip_form_feeds(input: &str) -> String {
    input.replace('\u{000C}', "")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_strip_form_feed() {
        assert_eq!(strip_form_feeds("page text\n\u{000C}"), "page text\n");
        assert_eq!(strip_form_feeds("a\tb"), "a\tb");
    }

    #[test]
    fn test_blank_page_becomes_empty() {
        assert_eq!(clean_page_text(" \n\n \u{000C}"), "");
        assert_eq!(clean_page_text(""), "");
    }

    #[test]
    fn test_interior_blank_lines_are_kept() {
        let input = "Summary of experience\n\n\n\n\nJane Doe\n\u{000C}";
        assert_eq!(clean_page_text(input), "Summary of experience\n\n\n\n\nJane Doe");
    }

    #[test]
    fn test_clean_page_full_pipeline() {
        let input = "  Jane Doe  \r\n\r\nSoftware Engineer   \r\n\u{000C}";
        assert_eq!(clean_page_text(input), "Jane Doe  \n\nSoftware Engineer");
    }

    #[test]
    fn test_invisible_characters_are_kept() {
        assert_eq!(clean_page_text("co\u{00AD}operate"), "co\u{00AD}operate");
    }
}
