//! Page fetching and readable-text extraction.
//!
//! This crate provides:
//! - [`ContentExtractor`]: the per-URL extraction capability the pipeline consumes
//! - [`HttpExtractor`]: fetches a page over HTTP with an SSRF guard
//! - [`extract_article_text`]: turns HTML into blank-line separated text blocks

mod content;
mod fetch;

use articleforge_shared::Result;

pub use content::extract_article_text;
pub use fetch::HttpExtractor;

/// Fetches one location and returns its readable text.
///
/// A page that cannot be fetched or parsed yields `Ok("")` rather than an
/// error. Callers still skip an `Err` from other implementations the same
/// way and move on to the next location.
#[async_trait::async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String>;
}
