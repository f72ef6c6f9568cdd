//! End-to-end generation pipeline: topic + headings → article + fact assignment.
//!
//! ```text
//! Retrieving → Distributing → ProducingSections → Aggregating → Done
//! ```
//!
//! Retrieval, segmentation, and distribution run once. Each heading then
//! runs as an independent section unit (produce → verify → polish) on a
//! bounded worker pool. Completed units are put back in heading order before
//! the article is assembled.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, instrument, warn};

use articleforge_extractor::{ContentExtractor, HttpExtractor};
use articleforge_llm::{OpenRouterClient, TextGenerator};
use articleforge_search::{HttpSearchClient, SearchClient};
use articleforge_shared::{
    AppConfig, ArticleForgeError, FactAssignment, FailureKind, PipelineConfig, Result, RunId,
    Section, SectionFailureMode, StageProfile,
};
use articleforge_text::count_words;

use crate::assembler::assemble;
use crate::facts::{distribute, fetch_fragments, segment};
use crate::policy::{FailureAction, FailurePolicy};
use crate::stages::{Stage, StageInput, StageRole};

/// Article text returned when retrieval aborts the run.
pub const RETRIEVAL_FAILED_MESSAGE: &str =
    "The article could not be generated: source material could not be retrieved.";

/// Article text returned when assembly fails.
pub const ASSEMBLY_FAILED_MESSAGE: &str = "The article could not be assembled.";

// ---------------------------------------------------------------------------
// Run output
// ---------------------------------------------------------------------------

/// Orchestrator state. Reported to [`ProgressReporter::phase`] on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Retrieving,
    Distributing,
    ProducingSections,
    Aggregating,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieving => "Retrieving sources",
            Self::Distributing => "Distributing facts",
            Self::ProducingSections => "Writing sections",
            Self::Aggregating => "Assembling article",
            Self::Done => "Done",
        }
    }
}

/// One section as it reached the assembler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    #[serde(flatten)]
    pub section: Section,
    /// Set when the unit failed and `content` is a placeholder or blank.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub fragments: usize,
    pub raw_facts: usize,
    pub assigned_facts: usize,
    pub sections_ok: usize,
    pub sections_failed: usize,
    /// Words in the finished article.
    pub words: usize,
    pub elapsed_ms: u64,
    /// Failure kind that aborted the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<FailureKind>,
}

/// Result of [`Pipeline::generate`].
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub topic: String,
    /// The finished document, or a fixed failure message if the run aborted.
    pub article: String,
    pub facts: FactAssignment,
    pub sections: Vec<SectionReport>,
    pub stats: RunStats,
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, phase: RunPhase);
    /// Called as each section unit completes (in completion order).
    fn section_finished(&self, heading: &str, ok: bool, finished: usize, total: usize);
    /// Called when the run completes, aborted or not.
    fn done(&self, output: &GenerationOutput);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: RunPhase) {}
    fn section_finished(&self, _heading: &str, _ok: bool, _finished: usize, _total: usize) {}
    fn done(&self, _output: &GenerationOutput) {}
}

// ---------------------------------------------------------------------------
// Section unit
// ---------------------------------------------------------------------------

/// The per-heading stages, shared read-only by every unit.
struct SectionStages {
    producer: Stage,
    verifier: Stage,
    stylist: Stage,
}

impl SectionStages {
    #[instrument(skip_all, fields(heading = %heading))]
    async fn run(&self, heading: &str, topic: &str, facts: &[String]) -> Result<String> {
        let draft = self
            .producer
            .run(StageInput::Produce {
                heading,
                topic,
                facts,
            })
            .await?;
        let verified = self.verifier.run(StageInput::Revise { text: &draft }).await?;
        self.stylist.run(StageInput::Revise { text: &verified }).await
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The generation orchestrator. Holds its collaborators and configuration
/// for any number of sequential runs; keeps no state between runs.
pub struct Pipeline {
    config: PipelineConfig,
    policy: FailurePolicy,
    search: Arc<dyn SearchClient>,
    extractor: Arc<dyn ContentExtractor>,
    distributor: Stage,
    stages: Arc<SectionStages>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        search: Arc<dyn SearchClient>,
        extractor: Arc<dyn ContentExtractor>,
        generator: Arc<dyn TextGenerator>,
    ) -> Result<Self> {
        config.validate()?;

        let stage = |role: StageRole, profile: StageProfile| {
            Stage::new(
                role,
                profile,
                config.default_model.clone(),
                generator.clone(),
                config.call_timeout,
            )
        };

        let distributor = stage(StageRole::Distributor, config.distributor.clone());
        let stages = Arc::new(SectionStages {
            producer: stage(StageRole::Producer, config.producer.clone()),
            verifier: stage(StageRole::Verifier, config.verifier.clone()),
            stylist: stage(StageRole::Stylist, config.stylist.clone()),
        });

        Ok(Self {
            policy: FailurePolicy::from_config(&config),
            config,
            search,
            extractor,
            distributor,
            stages,
        })
    }

    /// Wire the HTTP collaborators from the application config.
    pub fn from_app_config(app: &AppConfig, config: PipelineConfig) -> Result<Self> {
        let search = Arc::new(HttpSearchClient::from_config(&app.search)?);
        let extractor = Arc::new(HttpExtractor::from_config(&app.extractor)?);
        let generator = Arc::new(OpenRouterClient::from_config(app)?);
        Self::new(config, search, extractor, generator)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline for `topic` and the ordered `headings`.
    ///
    /// Per-section failures never fail the run. Aborts (retrieval under the
    /// `abort` policy, assembly failure) still return `Ok`, with a fixed
    /// message as the article and `stats.aborted` set.
    #[instrument(skip_all, fields(topic = %topic, headings = headings.len()))]
    pub async fn generate(
        &self,
        topic: &str,
        headings: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<GenerationOutput> {
        let start = Instant::now();
        let mut output = GenerationOutput {
            run_id: RunId::new(),
            started_at: Utc::now(),
            topic: topic.to_string(),
            article: String::new(),
            facts: FactAssignment::empty_for(headings),
            sections: Vec::new(),
            stats: RunStats::default(),
        };

        info!(run_id = %output.run_id, "starting generation run");

        // --- Phase 1: Retrieval ---
        progress.phase(RunPhase::Retrieving);
        let fragments = match fetch_fragments(
            self.search.as_ref(),
            self.extractor.as_ref(),
            topic,
            self.config.fetch_limit,
            self.config.call_timeout,
        )
        .await
        {
            Ok(fragments) => fragments,
            Err(e) => match self.policy.action(e.kind()) {
                FailureAction::AbortRun => {
                    error!(error = %e, "retrieval failed, aborting run");
                    return Ok(self.abort(output, e.kind(), start, progress));
                }
                FailureAction::SkipUnit | FailureAction::DefaultValue => {
                    warn!(error = %e, "retrieval failed, continuing without sources");
                    Vec::new()
                }
            },
        };
        let raw_facts = segment(&fragments, self.config.min_fact_chars);
        output.stats.fragments = fragments.len();
        output.stats.raw_facts = raw_facts.len();
        drop(fragments);

        // --- Phase 2: Distribution ---
        progress.phase(RunPhase::Distributing);
        let facts = match distribute(&self.distributor, &raw_facts, headings).await {
            Ok(facts) => facts,
            Err(e) => match self.policy.action(e.kind()) {
                FailureAction::AbortRun => {
                    error!(error = %e, "distribution failed, aborting run");
                    return Ok(self.abort(output, e.kind(), start, progress));
                }
                FailureAction::SkipUnit | FailureAction::DefaultValue => {
                    warn!(error = %e, "distribution failed, continuing without facts");
                    FactAssignment::empty_for(headings)
                }
            },
        };
        drop(raw_facts);
        output.stats.assigned_facts = facts.fact_count();
        output.facts = facts;

        // --- Phase 3: Section units ---
        progress.phase(RunPhase::ProducingSections);
        let reports = match self
            .produce_sections(topic, headings, &output.facts, progress)
            .await
        {
            Ok(reports) => reports,
            Err(kind) => return Ok(self.abort(output, kind, start, progress)),
        };
        output.stats.sections_failed = reports.iter().filter(|r| r.failed()).count();
        output.stats.sections_ok = reports.len() - output.stats.sections_failed;

        // --- Phase 4: Aggregation ---
        progress.phase(RunPhase::Aggregating);
        let sections: Vec<Section> = reports.iter().map(|r| r.section.clone()).collect();
        output.sections = reports;
        match assemble(&sections, topic) {
            Ok(article) => {
                output.stats.words = count_words(&article);
                output.article = article;
            }
            Err(e) => match self.policy.action(e.kind()) {
                FailureAction::AbortRun => {
                    error!(error = %e, "assembly failed, aborting run");
                    return Ok(self.abort(output, e.kind(), start, progress));
                }
                FailureAction::SkipUnit | FailureAction::DefaultValue => {
                    warn!(error = %e, "assembly failed, returning an empty article");
                }
            },
        }

        output.stats.elapsed_ms = elapsed_ms(start);
        progress.phase(RunPhase::Done);
        info!(
            run_id = %output.run_id,
            sections_ok = output.stats.sections_ok,
            sections_failed = output.stats.sections_failed,
            elapsed_ms = output.stats.elapsed_ms,
            "generation run complete"
        );
        progress.done(&output);
        Ok(output)
    }

    /// Fan the headings out over the worker pool and collect the units in
    /// heading order. `Err` carries the kind of a failure whose policy is to
    /// abort the run.
    async fn produce_sections(
        &self,
        topic: &str,
        headings: &[String],
        facts: &FactAssignment,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<Vec<SectionReport>, FailureKind> {
        let total = headings.len();
        let semaphore = Arc::new(Semaphore::new(self.config.section_concurrency));
        let topic: Arc<str> = Arc::from(topic);
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, Result<String>)>();

        let mut handles = Vec::with_capacity(total);
        for (index, heading) in headings.iter().enumerate() {
            let stages = self.stages.clone();
            let sem = semaphore.clone();
            let topic = topic.clone();
            let tx = tx.clone();
            let heading = heading.clone();
            let unit_facts = facts.facts_for(&heading).to_vec();

            handles.push(tokio::spawn(async move {
                let result = match sem.acquire().await {
                    Ok(_permit) => stages.run(&heading, &topic, &unit_facts).await,
                    Err(_) => Err(ArticleForgeError::Generation("worker pool closed".into())),
                };
                let _ = tx.send((index, result));
            }));
        }
        drop(tx);

        // Slots are indexed by heading position, filled in completion order.
        let mut slots: Vec<Option<SectionReport>> = vec![None; total];
        let mut finished = 0;
        while let Some((index, result)) = rx.recv().await {
            let heading = &headings[index];
            let report = match result {
                Ok(content) => SectionReport {
                    section: Section::new(heading.clone(), content),
                    error: None,
                },
                Err(e) => {
                    let kind = e.kind();
                    if self.policy.action(kind) == FailureAction::AbortRun {
                        error!(heading = %heading, error = %e, "section failure aborts the run");
                        handles.iter().for_each(|h| h.abort());
                        return Err(kind);
                    }
                    self.failed_report(heading, &e)
                }
            };

            finished += 1;
            progress.section_finished(heading, !report.failed(), finished, total);
            slots[index] = Some(report);
        }

        let reports: Vec<SectionReport> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let e = ArticleForgeError::Generation(
                        "section task ended without a result".into(),
                    );
                    self.failed_report(&headings[index], &e)
                })
            })
            .collect();

        debug!(sections = reports.len(), "section units collected");
        Ok(reports)
    }

    fn failed_report(&self, heading: &str, e: &ArticleForgeError) -> SectionReport {
        warn!(heading = %heading, error = %e, "section unit failed");
        let content = match self.config.on_section_failure {
            SectionFailureMode::Placeholder => placeholder(e),
            SectionFailureMode::Omit => String::new(),
        };
        SectionReport {
            section: Section::new(heading, content),
            error: Some(e.to_string()),
        }
    }

    fn abort(
        &self,
        mut output: GenerationOutput,
        kind: FailureKind,
        start: Instant,
        progress: &dyn ProgressReporter,
    ) -> GenerationOutput {
        output.article = match kind {
            FailureKind::Retrieval => RETRIEVAL_FAILED_MESSAGE,
            _ => ASSEMBLY_FAILED_MESSAGE,
        }
        .to_string();
        output.stats.aborted = Some(kind);
        output.stats.elapsed_ms = elapsed_ms(start);
        progress.phase(RunPhase::Done);
        progress.done(&output);
        output
    }
}

/// Visible in-document text for a failed section unit, kept on one line.
pub fn placeholder(error: &ArticleForgeError) -> String {
    let message = error.to_string();
    let message = message.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("[Section generation failed: {message}]")
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
