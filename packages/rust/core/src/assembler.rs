//! Article assembly.
//!
//! Turns the ordered section sequence into the final Markdown document:
//!
//! ```text
//! # {topic}
//!
//! {first line of the first non-empty section}
//!
//! ## {heading}
//!
//! {paragraph}
//!
//! {paragraph}
//! ```
//!
//! Sections with an empty heading or empty content are left out, so a unit
//! blanked by the orchestrator simply disappears.

use tracing::debug;

use articleforge_shared::{ArticleForgeError, Result, Section};
use articleforge_text::{first_line, paragraphs};

/// The assembled document, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: Option<String>,
    pub intro: Option<String>,
    pub sections: Vec<Section>,
}

impl Article {
    /// Build the article from sections in their final order.
    ///
    /// A heading spanning several lines is an
    /// [`ArticleForgeError::Aggregation`].
    pub fn build(sections: &[Section], topic: &str) -> Result<Self> {
        if let Some(bad) = sections
            .iter()
            .find(|s| s.heading.contains(['\n', '\r']))
        {
            return Err(ArticleForgeError::Aggregation(format!(
                "heading spans several lines: {:?}",
                bad.heading
            )));
        }

        let title = Some(topic.trim())
            .filter(|t| !t.is_empty())
            .map(String::from);

        let intro = sections
            .iter()
            .find(|s| !s.content.trim().is_empty())
            .and_then(|s| first_line(&s.content))
            .map(String::from);

        let kept: Vec<Section> = sections
            .iter()
            .filter(|s| !s.heading.trim().is_empty() && !s.content.trim().is_empty())
            .map(|s| Section::new(s.heading.trim(), s.content.trim()))
            .collect();

        debug!(
            input = sections.len(),
            kept = kept.len(),
            "article built"
        );

        Ok(Self {
            title,
            intro,
            sections: kept,
        })
    }

    /// Render as Markdown.
    pub fn render(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();

        if let Some(title) = &self.title {
            blocks.push(format!("# {title}"));
        }
        if let Some(intro) = &self.intro {
            blocks.push(intro.clone());
        }
        for section in &self.sections {
            blocks.push(format!("## {}", section.heading));
            blocks.extend(paragraphs(&section.content).into_iter().map(String::from));
        }

        blocks.join("\n\n").trim().to_string()
    }
}

/// Assemble sections into the final document text.
pub fn assemble(sections: &[Section], topic: &str) -> Result<String> {
    Article::build(sections, topic).map(|a| a.render())
}
