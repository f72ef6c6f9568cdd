//! Article generation pipeline for ArticleForge.
//!
//! This crate ties the search, extraction, and text-generation capabilities
//! into one run: fetch fragments, segment them into raw facts, distribute
//! facts across headings, run each heading through produce → verify →
//! polish, and assemble the article.

pub mod assembler;
pub mod facts;
pub mod pipeline;
pub mod policy;
pub mod stages;

pub use assembler::{Article, assemble};
pub use pipeline::{
    ASSEMBLY_FAILED_MESSAGE, GenerationOutput, Pipeline, ProgressReporter,
    RETRIEVAL_FAILED_MESSAGE, RunPhase, RunStats, SectionReport, SilentProgress,
};
pub use policy::{FailureAction, FailurePolicy};
pub use stages::{Stage, StageInput, StageRole};
