//! Failure policy table.
//!
//! Every recoverable step reports a `Result`; the orchestrator looks up the
//! error's [`FailureKind`] here instead of handling failures locally.

use articleforge_shared::{FailureKind, PipelineConfig, RetrievalFailureMode};

/// What the orchestrator does with a failed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Stop the run and return the fixed failure message.
    AbortRun,
    /// Drop or replace the failed unit and carry on.
    SkipUnit,
    /// Substitute the empty default for the unit's output.
    DefaultValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    retrieval: FailureAction,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            retrieval: FailureAction::DefaultValue,
        }
    }
}

impl FailurePolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let retrieval = match config.on_retrieval_failure {
            RetrievalFailureMode::Degrade => FailureAction::DefaultValue,
            RetrievalFailureMode::Abort => FailureAction::AbortRun,
        };
        Self { retrieval }
    }

    pub fn action(&self, kind: FailureKind) -> FailureAction {
        match kind {
            FailureKind::Retrieval => self.retrieval,
            FailureKind::Extraction => FailureAction::SkipUnit,
            FailureKind::Distribution => FailureAction::DefaultValue,
            FailureKind::Generation => FailureAction::SkipUnit,
            FailureKind::Aggregation => FailureAction::AbortRun,
            FailureKind::Other => FailureAction::SkipUnit,
        }
    }
}
