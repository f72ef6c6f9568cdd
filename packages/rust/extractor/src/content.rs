//! HTML → plain text blocks.
//!
//! Walks `<body>` in document order and keeps paragraphs, list items,
//! quotations, and table rows. Site chrome (navigation, headers, footers,
//! sidebars, scripts) never contributes text.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Elements whose text is never article content.
const CHROME_TAGS: [&str; 7] = ["nav", "header", "footer", "aside", "script", "style", "noscript"];

/// Elements that each become one or more text blocks.
const BLOCK_TAGS: [&str; 4] = ["p", "li", "blockquote", "table"];

/// Extract readable text from an HTML document.
///
/// Each block is separated by a blank line:
/// - `<p>` → its text
/// - `<li>` → `• text`
/// - `<blockquote>` → `Quote: text`
/// - `<table>` → one block per row, cells joined by ` | `
///
/// Blocks nested in an already captured block are not repeated.
pub fn extract_article_text(html: &str) -> String {
    static BODY_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));
    static BLOCK_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("p, li, blockquote, table").expect("valid selector"));

    let doc = Html::parse_document(html);
    let Some(body) = doc.select(&BODY_SEL).next() else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();

    for el in body.select(&BLOCK_SEL) {
        if has_ancestor(&el, &CHROME_TAGS) || has_ancestor(&el, &BLOCK_TAGS) {
            continue;
        }

        match el.value().name() {
            "p" => push_nonempty(&mut parts, element_text(&el)),
            "li" => {
                let text = element_text(&el);
                if !text.is_empty() {
                    parts.push(format!("• {text}"));
                }
            }
            "blockquote" => {
                let text = element_text(&el);
                if !text.is_empty() {
                    parts.push(format!("Quote: {text}"));
                }
            }
            "table" => parts.extend(table_rows(&el)),
            _ => {}
        }
    }

    parts.join("\n\n")
}

/// One ` | `-joined line per table row with at least one cell.
fn table_rows(table: &ElementRef) -> Vec<String> {
    static TR_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
    static CELL_SEL: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("td, th").expect("valid selector"));

    table
        .select(&TR_SEL)
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&CELL_SEL).map(|c| element_text(&c)).collect();
            if cells.is_empty() {
                None
            } else {
                Some(cells.join(" | "))
            }
        })
        .collect()
}

/// Text content with whitespace runs collapsed to single spaces.
fn element_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn has_ancestor(el: &ElementRef, names: &[&str]) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| names.contains(&a.value().name()))
}

fn push_nonempty(parts: &mut Vec<String>, text: String) {
    if !text.is_empty() {
        parts.push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_blocks_in_document_order() {
        let html = r#"<html><body>
            <h1>Coffee</h1>
            <p>Coffee   originated
               in Ethiopia.</p>
            <ul><li>Arabica</li><li>Robusta</li></ul>
            <blockquote>Coffee is a language in itself.</blockquote>
            <table>
                <tr><th>Method</th><th>Time</th></tr>
                <tr><td>Espresso</td><td>30s</td></tr>
            </table>
        </body></html>"#;

        let text = extract_article_text(html);
        assert_eq!(
            text,
            "Coffee originated in Ethiopia.\n\n• Arabica\n\n• Robusta\n\n\
             Quote: Coffee is a language in itself.\n\nMethod | Time\n\nEspresso | 30s"
        );
    }

    #[test]
    fn skips_site_chrome() {
        let html = r#"<html><body>
            <nav><ul><li>Home</li><li>About</li></ul></nav>
            <header><p>Site banner</p></header>
            <main><p>Real content here.</p></main>
            <footer><p>Copyright 2024</p></footer>
            <script>var x = "<p>not text</p>";</script>
        </body></html>"#;

        let text = extract_article_text(html);
        assert_eq!(text, "Real content here.");
    }

    #[test]
    fn nested_blocks_are_not_repeated() {
        let html = r#"<html><body>
            <blockquote><p>Inner paragraph.</p></blockquote>
            <ul><li><p>Item paragraph.</p></li></ul>
        </body></html>"#;

        let text = extract_article_text(html);
        assert_eq!(text, "Quote: Inner paragraph.\n\n• Item paragraph.");
    }

    #[test]
    fn empty_elements_are_dropped() {
        let html = "<html><body><p>   </p><li></li><p>Kept</p></body></html>";
        assert_eq!(extract_article_text(html), "Kept");
    }

    #[test]
    fn document_without_blocks_is_empty() {
        assert_eq!(extract_article_text("<html><body><div>loose</div></body></html>"), "");
        assert_eq!(extract_article_text(""), "");
    }
}
