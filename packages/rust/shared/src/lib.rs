//! Shared types, error model, and configuration for ArticleForge.
//!
//! This crate is the foundation depended on by all other ArticleForge crates.
//! It provides:
//! - [`ArticleForgeError`]: the unified error type, classified by [`FailureKind`]
//! - Domain types ([`Section`], [`FactAssignment`], [`SearchHit`], [`RunId`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], [`StageProfile`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CriteriaConfig, ExtractorConfig, OpenRouterConfig, PipelineConfig,
    PipelineSettings, RetrievalFailureMode, SearchConfig, SectionFailureMode, StageProfile,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{ArticleForgeError, FailureKind, Result};
pub use types::{FactAssignment, RunId, SearchHit, Section};
