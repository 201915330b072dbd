//! Core data models used throughout the analyzer.
//!
//! A [`Document`] is the unit that flows from the document processor
//! through chunking into the vector index. Every document carries
//! [`Metadata`] with a `source` file name and a [`DocType`]; retrieval
//! filters and context labels are built from those two keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The three kinds of reference material the index is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    /// Free-form JQL cheat sheets (`jql/*.md`, `jql/*.txt`).
    JqlCheatsheet,
    /// One rendered Jira field description (`fields/*.json`).
    FieldDocumentation,
    /// One grouped summary of historical issues (`history/*.csv`).
    HistoricalSummary,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::JqlCheatsheet => "jql_cheatsheet",
            DocType::FieldDocumentation => "field_documentation",
            DocType::HistoricalSummary => "historical_summary",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jql_cheatsheet" => Some(DocType::JqlCheatsheet),
            "field_documentation" => Some(DocType::FieldDocumentation),
            "historical_summary" => Some(DocType::HistoricalSummary),
            _ => None,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document metadata: the mandatory `source` and `type` keys plus any
/// type-specific attributes (`field_name`, `project`, `issue_type`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new(source: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            source: source.into(),
            doc_type,
            extra: BTreeMap::new(),
        }
    }

    /// Attach a type-specific attribute.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up any metadata key, including `source` and `type`.
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "source" => Some(&self.source),
            "type" => Some(self.doc_type.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }

    /// Returns true when every key in `filter` is present with an equal value.
    pub fn matches(&self, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.get(key) == Some(expected.as_str()))
    }
}

/// Equality predicate over metadata keys used to narrow similarity search.
pub type MetadataFilter = BTreeMap<String, String>;

/// A unit of text with metadata. Chunks are documents too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }
}

/// A document returned from similarity search with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}
