//! Fact retrieval, segmentation, and distribution across headings.
//!
//! These three steps run once per pipeline invocation, before any section
//! unit starts.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use articleforge_extractor::ContentExtractor;
use articleforge_search::SearchClient;
use articleforge_shared::{ArticleForgeError, FactAssignment, Result};
use articleforge_text::{paragraphs, truncate_chars};

use crate::stages::{Stage, StageInput};

/// Upper bound on the raw-fact text sent to the distributor.
const MAX_RAW_FACT_PROMPT_CHARS: usize = 24_000;

// ---------------------------------------------------------------------------
// Fact source
// ---------------------------------------------------------------------------

/// Search for `topic` and extract up to `limit` pages.
///
/// Pages that fail to extract, time out, or yield no text are skipped.
/// Only a failing search is an error ([`ArticleForgeError::Retrieval`]).
#[instrument(skip_all, fields(topic = %topic, limit = limit))]
pub async fn fetch_fragments(
    search: &dyn SearchClient,
    extractor: &dyn ContentExtractor,
    topic: &str,
    limit: usize,
    call_timeout: Duration,
) -> Result<Vec<String>> {
    if limit == 0 {
        return Err(ArticleForgeError::validation("fetch limit must be at least 1"));
    }

    let hits = tokio::time::timeout(call_timeout, search.search(topic, limit))
        .await
        .map_err(|_| {
            ArticleForgeError::Retrieval(format!("search timed out after {call_timeout:?}"))
        })?
        .map_err(|e| match e {
            ArticleForgeError::Retrieval(_) => e,
            other => ArticleForgeError::Retrieval(other.to_string()),
        })?;

    let mut fragments = Vec::new();
    for hit in hits.iter().take(limit) {
        let outcome = tokio::time::timeout(call_timeout, extractor.extract(&hit.url)).await;
        match outcome {
            Ok(Ok(text)) if !text.trim().is_empty() => fragments.push(text),
            Ok(Ok(_)) => debug!(url = %hit.url, "page had no usable text"),
            Ok(Err(e)) => warn!(url = %hit.url, error = %e, "extraction failed, skipping"),
            Err(_) => warn!(url = %hit.url, "extraction timed out, skipping"),
        }
    }

    info!(hits = hits.len(), fragments = fragments.len(), "fragments fetched");
    Ok(fragments)
}

// ---------------------------------------------------------------------------
// Segmenter
// ---------------------------------------------------------------------------

/// Split fragments into paragraphs longer than `min_chars` (trimmed, in characters).
pub fn segment(fragments: &[String], min_chars: usize) -> Vec<String> {
    fragments
        .iter()
        .flat_map(|f| paragraphs(f))
        .filter(|p| p.chars().count() > min_chars)
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Distributor
// ---------------------------------------------------------------------------

/// Route raw facts to headings with the distributor stage.
///
/// With no raw facts or no headings the model is not called. A failed call
/// or a reply that is not a JSON object is an
/// [`ArticleForgeError::Distribution`]; the orchestrator decides how to
/// degrade.
#[instrument(skip_all, fields(raw_facts = raw_facts.len(), headings = headings.len()))]
pub async fn distribute(
    stage: &Stage,
    raw_facts: &[String],
    headings: &[String],
) -> Result<FactAssignment> {
    if raw_facts.is_empty() || headings.is_empty() {
        debug!("nothing to distribute");
        return Ok(FactAssignment::empty_for(headings));
    }

    let listed = raw_facts
        .iter()
        .map(|f| format!("- {}", f.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let listed = truncate_chars(&listed, MAX_RAW_FACT_PROMPT_CHARS);

    let reply = stage
        .run(StageInput::Distribute {
            raw_facts: &listed,
            headings,
        })
        .await
        .map_err(|e| ArticleForgeError::Distribution(e.to_string()))?;

    let assignment = parse_assignment(&reply, headings)?;
    info!(
        assigned = assignment.fact_count(),
        "facts distributed"
    );
    Ok(assignment)
}

/// Parse a distributor reply into an assignment keyed by `headings`.
///
/// The reply must be a JSON object, optionally fenced or surrounded by
/// prose. Keys match headings exactly, then trimmed and case-insensitively;
/// unknown keys are dropped. Array values keep their non-empty string items;
/// any other value counts as no facts. Facts are trimmed and deduplicated,
/// and a fact already routed to an earlier heading is not repeated.
pub fn parse_assignment(reply: &str, headings: &[String]) -> Result<FactAssignment> {
    let object = match serde_json::from_str::<Value>(json_candidate(reply)) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(ArticleForgeError::Distribution(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )));
        }
        Err(e) => {
            return Err(ArticleForgeError::Distribution(format!(
                "reply is not valid JSON: {e}"
            )));
        }
    };

    let exact: HashSet<&str> = headings.iter().map(String::as_str).collect();
    let folded: HashMap<String, &str> = headings
        .iter()
        .map(|h| (h.trim().to_lowercase(), h.as_str()))
        .collect();

    let mut collected: HashMap<&str, Vec<String>> = HashMap::new();
    for (key, value) in &object {
        let heading = if exact.contains(key.as_str()) {
            exact.get(key.as_str()).copied()
        } else {
            folded.get(&key.trim().to_lowercase()).copied()
        };
        let Some(heading) = heading else {
            debug!(key = %key, "dropping unknown heading key");
            continue;
        };

        let facts = collected.entry(heading).or_default();
        if let Value::Array(items) = value {
            facts.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(String::from),
            );
        }
    }

    let mut assignment = FactAssignment::empty_for(headings);
    let mut seen = HashSet::new();
    for heading in headings {
        let Some(facts) = collected.remove(heading.as_str()) else {
            continue;
        };
        if let Some(slot) = assignment.entry_mut(heading) {
            slot.extend(facts.into_iter().filter(|f| seen.insert(f.to_lowercase())));
        }
    }

    Ok(assignment)
}

/// Strip a code fence, then narrow to the outermost `{ … }` span.
fn json_candidate(reply: &str) -> &str {
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\n?(.*?)```").expect("valid regex")
    });

    let body = FENCE_RE
        .captures(reply)
        .and_then(|c| c.get(1))
        .map_or(reply, |m| m.as_str());

    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body.trim(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
