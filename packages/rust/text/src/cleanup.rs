//! Cleanup pipeline for model-generated text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The pipeline removes wrappers the model adds around its answer and
//! normalizes headings, whitespace, and paragraph breaks.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on generated text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = normalize_line_endings(text);

    result = strip_code_fence(&result);
    result = strip_wrapping_quotes(&result);
    result = drop_leading_heading(&result);
    result = demote_headings(&result);
    result = strip_leftover_html(&result);
    result = normalize_whitespace(&result);
    result = clean_blank_lines(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Code fence wrapper
// ---------------------------------------------------------------------------

/// Remove a code fence that wraps the whole answer (```markdown ... ```).
fn strip_code_fence(text: &str) -> String {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)\A\s*```[A-Za-z0-9_-]*[ \t]*\n(.*?)\n?```\s*\z").expect("valid regex")
    });

    match FENCE_RE.captures(text) {
        Some(caps) => caps[1].to_string(),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Pass 3: Wrapping quotes
// ---------------------------------------------------------------------------

/// Remove one pair of quotes around the whole answer.
///
/// The pair is stripped only when the opening quote is closed by the final
/// character, so `"One" and "two"` is left alone while
/// `"It is called the "bloom" phase."` is unwrapped.
fn strip_wrapping_quotes(text: &str) -> String {
    const PAIRS: [(char, char); 3] = [('"', '"'), ('\u{201C}', '\u{201D}'), ('\u{AB}', '\u{BB}')];

    let trimmed = text.trim();
    for (open, close) in PAIRS {
        let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        else {
            continue;
        };
        if outer_pair_encloses(inner, open, close) {
            return inner.to_string();
        }
    }
    text.to_string()
}

/// True when no quote inside `inner` closes the outer opening quote.
///
/// For a symmetric quote character, an occurrence at the start of a word
/// opens and any other occurrence closes.
fn outer_pair_encloses(inner: &str, open: char, close: char) -> bool {
    let mut depth = 1usize;
    let mut prev: Option<char> = None;

    for c in inner.chars() {
        let opens = if open == close {
            c == open && prev.is_none_or(|p| p.is_whitespace() || "([{-/".contains(p))
        } else {
            c == open
        };

        if opens {
            depth += 1;
        } else if c == close {
            if depth == 1 {
                return false;
            }
            depth -= 1;
        }
        prev = Some(c);
    }
    true
}

// ---------------------------------------------------------------------------
// Pass 4: Echoed heading
// ---------------------------------------------------------------------------

/// Drop a Markdown heading on the first non-blank line.
///
/// The section heading is rendered by the assembler; a model echoing it
/// would duplicate it. Lines like `#1 pick` are text, not headings.
fn drop_leading_heading(text: &str) -> String {
    static LEADING_H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^\s*#{1,6}\s+\S").expect("valid regex"));

    let mut lines = text.lines().skip_while(|l| l.trim().is_empty()).peekable();

    let echoed = lines.peek().is_some_and(|first| LEADING_H_RE.is_match(first));
    if echoed {
        lines.skip(1).collect::<Vec<_>>().join("\n")
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Pass 5: Demote headings
// ---------------------------------------------------------------------------

/// Keep every remaining heading below the section level (`###` or deeper).
fn demote_headings(text: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

    text.lines()
        .map(|line| match H_RE.captures(line) {
            Some(caps) if caps[1].len() < 3 => format!("### {}", &caps[2]),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray block-level HTML tags, and echoed `<text>` delimiters,
/// preserving their inner text.
fn strip_leftover_html(text: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|section|article|p|br|header|footer|text)(?:\s[^>]*)?/?>")
            .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(text, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line and turn whitespace-only lines blank.
fn normalize_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 8: Paragraph breaks
// ---------------------------------------------------------------------------

/// Collapse runs of blank lines into a single paragraph break.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(text, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fence_unwraps_whole_answer() {
        let input = "```markdown\nFirst paragraph.\n\nSecond.\n```";
        assert_eq!(strip_code_fence(input), "First paragraph.\n\nSecond.");
    }

    #[test]
    fn strip_code_fence_keeps_inner_code_blocks() {
        let input = "Intro\n\n```rust\nfn main() {}\n```\n\nOutro";
        assert_eq!(strip_code_fence(input), input);
    }

    #[test]
    fn strip_wrapping_quotes_removes_single_pair() {
        assert_eq!(strip_wrapping_quotes("\"Plain text.\""), "Plain text.");
        assert_eq!(strip_wrapping_quotes("\u{AB}Text\u{BB}"), "Text");
    }

    #[test]
    fn strip_wrapping_quotes_keeps_inner_quotes() {
        let input = "\"One\" and \"two\"";
        assert_eq!(strip_wrapping_quotes(input), input);
    }

    #[test]
    fn drop_leading_heading_removes_echo() {
        let input = "\n## History\nCoffee has a long past.";
        assert_eq!(drop_leading_heading(input), "Coffee has a long past.");
    }

    #[test]
    fn strip_wrapping_quotes_unwraps_text_with_quoted_word() {
        let input = "\"Baristas call it the \"bloom\" phase.\"";
        assert_eq!(
            strip_wrapping_quotes(input),
            "Baristas call it the \"bloom\" phase."
        );
        assert_eq!(
            strip_wrapping_quotes("\u{201C}A \u{201C}nested\u{201D} word\u{201D}"),
            "A \u{201C}nested\u{201D} word"
        );
        assert_eq!(
            strip_wrapping_quotes("\u{201C}One\u{201D} and \u{201C}two\u{201D}"),
            "\u{201C}One\u{201D} and \u{201C}two\u{201D}"
        );
    }

    #[test]
    fn drop_leading_heading_keeps_numbered_first_line() {
        let input = "#1 on the list is the Ethiopian Yirgacheffe bean.\nIt is floral and bright.";
        assert_eq!(drop_leading_heading(input), input);
        assert_eq!(drop_leading_heading("#coffee lovers agree.\nMore."), "#coffee lovers agree.\nMore.");
        assert_eq!(run_pipeline(input), input);
    }

    #[test]
    fn drop_leading_heading_keeps_plain_text() {
        let input = "Coffee has a long past.\n## Later";
        assert_eq!(drop_leading_heading(input), input);
    }

    #[test]
    fn demote_headings_pushes_below_section_level() {
        let input = "# Big\ntext\n## Mid\n#### Deep";
        assert_eq!(demote_headings(input), "### Big\ntext\n### Mid\n#### Deep");
    }

    #[test]
    fn strip_leftover_html_keeps_content() {
        let input = "<p>Important info</p><br/>";
        assert_eq!(strip_leftover_html(input), "Important info");
        assert_eq!(strip_leftover_html("<text>\nEdited.\n</text>"), "\nEdited.\n");
    }

    #[test]
    fn clean_blank_lines_collapses_to_one_break() {
        assert_eq!(clean_blank_lines("A\n\n\n\n\nB"), "A\n\nB");
        assert_eq!(clean_blank_lines("A\n\nB"), "A\n\nB");
    }

    #[test]
    fn normalize_whitespace_trims_trailing() {
        let input = "Line 1   \n  \t\nLine 3";
        assert_eq!(normalize_whitespace(input), "Line 1\n\nLine 3");
    }

    #[test]
    fn full_pipeline_cleans_model_output() {
        let input = "```\r\n## Methods\r\nPour-over is slow.   \r\n\r\n\r\n\r\n<div>Espresso is fast.</div>\r\n```";
        assert_eq!(run_pipeline(input), "Pour-over is slow.\n\nEspresso is fast.");
    }
}
