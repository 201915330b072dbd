//! Query engine.
//!
//! Retrieves context for a question, fills the prompt template and asks
//! the chat model for a JQL query. The raw answer is classified once,
//! here, into a [`Generation`] so callers branch on a type instead of
//! re-inspecting model text.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::ChatModel;
use crate::models::{Document, MetadataFilter};
use crate::store::VectorStoreManager;

/// Phrase the model is told to answer with when it cannot build a query.
pub const UNCERTAINTY_MARKER: &str = "I'm not sure";

/// Prompt sent to the chat model. `{context}` and `{question}` are
/// substituted by [`QueryEngine::build_prompt`].
pub const PROMPT_TEMPLATE: &str = r#"You are a JIRA Query Language expert. Use the following context and user question to generate a JQL query.
If you're not sure about the answer, say "I'm not sure" - don't try to make up an answer.

Use the historical patterns and field documentation to construct accurate queries.
Make sure to use proper field names and operators as shown in the documentation.

Context: {context}
Question: {question}

JQL Query:"#;

/// Outcome of one generation call. Both variants carry the model's text
/// unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// The model produced something to run against the tracker.
    Query(String),
    /// The model declined with the uncertainty marker.
    Uncertain(String),
}

impl Generation {
    /// Classify a raw model answer.
    ///
    /// Only an answer containing the exact uncertainty marker is
    /// uncertain. Everything else, including blank answers and other
    /// wordings of doubt, is passed on as a query; those are logged.
    pub fn classify(raw: String) -> Self {
        if raw.contains(UNCERTAINTY_MARKER) {
            return Generation::Uncertain(raw);
        }
        let normalized = raw.replace('\u{2019}', "'").to_lowercase();
        if raw.trim().is_empty() || normalized.contains(&UNCERTAINTY_MARKER.to_lowercase()) {
            warn!(answer = %raw, "answer looks uncertain but lacks the exact marker");
        }
        Generation::Query(raw)
    }

    pub fn raw(&self) -> &str {
        match self {
            Generation::Query(s) | Generation::Uncertain(s) => s,
        }
    }

    pub fn is_uncertain(&self) -> bool {
        matches!(self, Generation::Uncertain(_))
    }
}

pub struct QueryEngine {
    store: VectorStoreManager,
    llm: Arc<dyn ChatModel>,
}

impl QueryEngine {
    pub fn new(store: VectorStoreManager, llm: Arc<dyn ChatModel>) -> Self {
        Self { store, llm }
    }

    pub fn store(&self) -> &VectorStoreManager {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut VectorStoreManager {
        &mut self.store
    }

    pub fn build_prompt(context: &str, question: &str) -> String {
        PROMPT_TEMPLATE
            .replace("{context}", context)
            .replace("{question}", question)
    }

    /// Retrieve context for `query`, prompt the model and classify its answer.
    pub async fn generate(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Generation> {
        let context = self.store.assemble_context(query, filter).await?;
        let prompt = Self::build_prompt(&context, query);
        debug!(
            model = self.llm.model_name(),
            prompt_chars = prompt.len(),
            "requesting completion"
        );

        let answer = self.llm.complete(&prompt).await?;
        let generation = Generation::classify(answer);
        info!(uncertain = generation.is_uncertain(), "query generated");
        Ok(generation)
    }

    /// Append `documents` to the index. Retrieval reads the live index, so
    /// the next [`generate`](Self::generate) sees them.
    pub async fn update(&mut self, documents: &[Document]) -> Result<()> {
        self.store.add(documents).await
    }
}
