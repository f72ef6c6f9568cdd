//! Core domain types shared by the pipeline crates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// SearchHit
// ---------------------------------------------------------------------------

/// One result returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// FactAssignment
// ---------------------------------------------------------------------------

/// Heading → short facts routed to that heading.
///
/// Keys are exactly the distinct input headings; a fact string appears under
/// at most one heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactAssignment(BTreeMap<String, Vec<String>>);

impl FactAssignment {
    /// An assignment with every heading present and no facts.
    pub fn empty_for<S: AsRef<str>>(headings: &[S]) -> Self {
        Self(
            headings
                .iter()
                .map(|h| (h.as_ref().to_string(), Vec::new()))
                .collect(),
        )
    }

    /// Facts for `heading`, or an empty slice if the heading is unknown.
    pub fn facts_for(&self, heading: &str) -> &[String] {
        self.0.get(heading).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable access for the distributor while it fills the mapping.
    pub fn entry_mut(&mut self, heading: &str) -> Option<&mut Vec<String>> {
        self.0.get_mut(heading)
    }

    pub fn headings(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of headings (keys).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of facts across all headings.
    pub fn fact_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// One article section. The content is a draft, verified, or polished text,
/// or an error placeholder when the section unit failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub content: String,
}

impl Section {
    pub fn new(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            content: content.into(),
        }
    }
}
