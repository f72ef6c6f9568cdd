//! Error types for ArticleForge.
//!
//! Library crates use [`ArticleForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all ArticleForge operations.
#[derive(Debug, thiserror::Error)]
pub enum ArticleForgeError {
    /// Search or transport failure upstream of content extraction.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// A single page could not be fetched or parsed.
    #[error("extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    /// The fact classification call failed or returned an unusable shape.
    #[error("distribution error: {0}")]
    Distribution(String),

    /// Any text-generation call failure (drafting, verification, polishing).
    #[error("generation error: {0}")]
    Generation(String),

    /// Malformed section sequence reaching the assembler.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error that is not yet attributed to a pipeline stage.
    #[error("network error: {0}")]
    Network(String),

    /// Response or document parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ArticleForgeError>;

/// Coarse failure classification consumed by the orchestrator's policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Retrieval,
    Extraction,
    Distribution,
    Generation,
    Aggregation,
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Retrieval => "retrieval",
            Self::Extraction => "extraction",
            Self::Distribution => "distribution",
            Self::Generation => "generation",
            Self::Aggregation => "aggregation",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl ArticleForgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction error for a single URL.
    pub fn extraction(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for the failure policy table.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Retrieval(_) => FailureKind::Retrieval,
            Self::Extraction { .. } => FailureKind::Extraction,
            Self::Distribution(_) => FailureKind::Distribution,
            Self::Generation(_) => FailureKind::Generation,
            Self::Aggregation(_) => FailureKind::Aggregation,
            Self::Config { .. }
            | Self::Network(_)
            | Self::Parse { .. }
            | Self::Io { .. }
            | Self::Validation { .. } => FailureKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ArticleForgeError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ArticleForgeError::extraction("https://example.com", "HTTP 404");
        assert!(err.to_string().contains("https://example.com"));
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn errors_map_to_failure_kinds() {
        assert_eq!(
            ArticleForgeError::Retrieval("down".into()).kind(),
            FailureKind::Retrieval
        );
        assert_eq!(
            ArticleForgeError::Generation("quota".into()).kind(),
            FailureKind::Generation
        );
        assert_eq!(
            ArticleForgeError::Aggregation("bad".into()).kind(),
            FailureKind::Aggregation
        );
        assert_eq!(ArticleForgeError::parse("x").kind(), FailureKind::Other);
    }
}
