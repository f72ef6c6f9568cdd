//! Text utilities shared by the pipeline stages.
//!
//! - [`clean_generated`] runs the cleanup passes over a model reply
//! - [`paragraphs`] splits text into blank-line separated blocks
//! - [`is_approval_sentinel`] recognizes "looks fine" replies that carry no text

mod cleanup;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Normalize a model reply: unwrap fences and quotes, drop an echoed
/// heading, demote headings, collapse blank lines, trim.
pub fn clean_generated(text: &str) -> String {
    let cleaned = cleanup::run_pipeline(text);
    debug!(
        raw_len = text.len(),
        cleaned_len = cleaned.len(),
        "generated text cleaned"
    );
    cleaned
}

/// Split text into trimmed, non-empty paragraphs (blank-line separated).
pub fn paragraphs(text: &str) -> Vec<&str> {
    static PARA_BREAK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("valid regex"));

    PARA_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// First non-blank line, trimmed.
pub fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

/// True when the whole reply is an approval with no content, e.g.
/// "No changes needed." or "The text is correct".
pub fn is_approval_sentinel(text: &str) -> bool {
    static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"(?i)^(ok(ay)?|looks (fine|good)|all good|no (changes|edits|corrections)( (are )?(needed|required|necessary))?|(the )?text is (correct|fine|accurate)( as is)?|nothing to (change|fix|correct))$",
        )
        .expect("valid regex")
    });

    let normalized = text
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_ascii_punctuation() || c.is_whitespace());

    normalized.len() <= 60 && SENTINEL_RE.is_match(normalized)
}

/// Truncate to at most `max_chars` characters on a char boundary, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}\n\n[... truncated ...]", &text[..cut]),
    }
}

/// Count words, excluding fenced code blocks.
pub fn count_words(text: &str) -> usize {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid regex"));

    CODE_BLOCK_RE
        .replace_all(text, "")
        .split_whitespace()
        .filter(|w| !w.starts_with('#') || w.len() > 2)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First block\nstill first\n\n  \nSecond block\n \t \nThird";
        assert_eq!(
            paragraphs(text),
            vec!["First block\nstill first", "Second block", "Third"]
        );
    }

    #[test]
    fn paragraphs_of_blank_text_is_empty() {
        assert!(paragraphs("   \n\n  ").is_empty());
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n\n  Intro line  \nrest"), Some("Intro line"));
        assert_eq!(first_line("  \n "), None);
    }

    #[test]
    fn approval_sentinels_are_recognized() {
        assert!(is_approval_sentinel("No changes needed."));
        assert!(is_approval_sentinel("  \"Looks good!\" "));
        assert!(is_approval_sentinel("The text is correct as is."));
        assert!(is_approval_sentinel("OK"));
    }

    #[test]
    fn real_text_is_not_a_sentinel() {
        assert!(!is_approval_sentinel("OK, here is the corrected text: coffee beans are seeds."));
        assert!(!is_approval_sentinel("Looks fine at first glance, but the dates are wrong."));
        assert!(!is_approval_sentinel(""));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        let truncated = truncate_chars("кофейня", 3);
        assert!(truncated.starts_with("коф"));
        assert!(truncated.contains("truncated"));
    }

    #[test]
    fn count_words_ignores_code() {
        assert_eq!(count_words("one two\n```\nlet x = 1;\n```\nthree"), 3);
    }

    #[test]
    fn clean_generated_runs_pipeline() {
        assert_eq!(clean_generated("\"Just text.\"\n\n\n"), "Just text.");
    }
}
