//! The JQL analyzer: ties processing, retrieval, generation and issue
//! search together for one question at a time.
//!
//! # Request flow
//!
//! ```text
//! respond(text)
//!   ├─ engine.generate(text)        (read lock)
//!   ├─ Uncertain  → { status: "unclear", message }
//!   └─ Query(jql) → tracker.search_issues(jql, 10)
//!                    → { status: "success", jql_query, results }
//! any failure      → { status: "error", message }
//! ```
//!
//! The query engine sits behind a `tokio::sync::RwLock`: questions share
//! the read side, context updates take the write side while documents
//! are appended.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::chunk::TextSplitter;
use crate::config::Config;
use crate::engine::{Generation, QueryEngine};
use crate::jira::{IssueSummary, IssueTracker, JiraClient};
use crate::llm::{create_chat_model, ChatModel};
use crate::processor::DocumentProcessor;
use crate::store::VectorStoreManager;

/// Returned when the model could not produce a query.
pub const UNCLEAR_MESSAGE: &str =
    "I couldn't generate a JQL query for your request. Could you please rephrase or provide more details?";

/// Default number of issues requested per query.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Response envelope, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzeResponse {
    Success {
        jql_query: String,
        results: Vec<IssueSummary>,
    },
    Unclear {
        message: String,
    },
    Error {
        message: String,
    },
}

/// The parts of a request context the analyzer acts on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextUpdate {
    /// Document root to process and append to the index.
    #[serde(default)]
    pub new_docs: Option<PathBuf>,
}

pub struct JqlAnalyzer {
    processor: DocumentProcessor,
    engine: RwLock<QueryEngine>,
    tracker: Arc<dyn IssueTracker>,
    max_results: usize,
}

impl JqlAnalyzer {
    pub fn new(
        processor: DocumentProcessor,
        engine: QueryEngine,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            processor,
            engine: RwLock::new(engine),
            tracker,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Build every component from `config` and index `docs.root`.
    ///
    /// Tracker credentials are checked first, so a misconfigured
    /// deployment fails before any embedding calls are made.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let tracker: Arc<dyn IssueTracker> = Arc::new(JiraClient::from_config(&config.jira)?);
        let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let processor = DocumentProcessor::new(splitter);
        let store = VectorStoreManager::from_config(config).await?;
        let llm: Arc<dyn ChatModel> = Arc::from(create_chat_model(&config.llm)?);
        let engine = QueryEngine::new(store, llm);

        let analyzer =
            Self::new(processor, engine, tracker).with_max_results(config.jira.max_results);
        analyzer.initialize(&config.docs.root).await?;
        Ok(analyzer)
    }

    /// Process `root` and replace the index with the result.
    pub async fn initialize(&self, root: &Path) -> Result<()> {
        let documents = self.processor.process(root)?;
        let mut engine = self.engine.write().await;
        engine.store_mut().initialize(&documents).await?;
        info!(root = %root.display(), chunks = documents.len(), "analyzer ready");
        Ok(())
    }

    /// Process `root` and append the result to the index.
    pub async fn ingest(&self, root: &Path) -> Result<usize> {
        let documents = self.processor.process(root)?;
        let mut engine = self.engine.write().await;
        engine.update(&documents).await?;
        info!(root = %root.display(), chunks = documents.len(), "context updated");
        Ok(documents.len())
    }

    /// Answer one question. Never fails: errors become
    /// [`AnalyzeResponse::Error`].
    pub async fn respond(&self, text: &str) -> AnalyzeResponse {
        match self.try_respond(text).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "query failed");
                AnalyzeResponse::Error {
                    message: format!("Error processing query: {}", e),
                }
            }
        }
    }

    async fn try_respond(&self, text: &str) -> Result<AnalyzeResponse> {
        let generation = {
            let engine = self.engine.read().await;
            engine.generate(text, None).await?
        };

        let jql = match generation {
            Generation::Uncertain(_) => {
                return Ok(AnalyzeResponse::Unclear {
                    message: UNCLEAR_MESSAGE.to_string(),
                })
            }
            Generation::Query(jql) => jql,
        };

        let issues = self.tracker.search_issues(&jql, self.max_results).await?;
        Ok(AnalyzeResponse::Success {
            jql_query: jql,
            results: issues.into_iter().map(IssueSummary::from).collect(),
        })
    }

    /// Apply a request context. Only `new_docs` is acted upon; other keys
    /// are ignored.
    pub async fn update_context(&self, context: &serde_json::Value) -> Result<()> {
        if !context.is_object() {
            bail!("context must be a JSON object");
        }
        let update: ContextUpdate = serde_json::from_value(context.clone())
            .with_context(|| "Invalid context: new_docs must be a path string")?;
        if let Some(root) = update.new_docs {
            self.ingest(&root).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::Embedder;
    use crate::index::InMemoryIndex;
    use crate::jira::{Issue, IssueFields, NamedValue};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    struct FixedChat(&'static str);

    #[async_trait]
    impl ChatModel for FixedChat {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatModel for FailingChat {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            bail!("rate limited")
        }
    }

    #[derive(Default)]
    struct RecordingTracker {
        calls: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl IssueTracker for RecordingTracker {
        async fn search_issues(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>> {
            self.calls
                .lock()
                .unwrap()
                .push((jql.to_string(), max_results));
            Ok(vec![Issue {
                key: "OPS-7".to_string(),
                fields: IssueFields {
                    summary: Some("Printer on fire".to_string()),
                    status: Some(NamedValue {
                        name: Some("Open".to_string()),
                    }),
                    ..IssueFields::default()
                },
            }])
        }
    }

    fn docs_root() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let jql = tmp.path().join("jql");
        std::fs::create_dir_all(&jql).unwrap();
        std::fs::write(jql.join("basics.md"), "project = OPS AND status = Open").unwrap();
        tmp
    }

    async fn analyzer(
        chat: Arc<dyn ChatModel>,
        tracker: Arc<RecordingTracker>,
        root: &Path,
    ) -> JqlAnalyzer {
        let store = VectorStoreManager::new(Arc::new(ConstEmbedder), Arc::new(InMemoryIndex::new()));
        let analyzer = JqlAnalyzer::new(
            DocumentProcessor::default(),
            QueryEngine::new(store, chat),
            tracker,
        );
        analyzer.initialize(root).await.unwrap();
        analyzer
    }

    #[tokio::test]
    async fn test_unclear_skips_tracker() {
        let root = docs_root();
        let tracker = Arc::new(RecordingTracker::default());
        let analyzer = analyzer(
            Arc::new(FixedChat("I'm not sure how to express that.")),
            tracker.clone(),
            root.path(),
        )
        .await;

        let response = analyzer.respond("something vague").await;
        assert_eq!(
            response,
            AnalyzeResponse::Unclear {
                message: UNCLEAR_MESSAGE.to_string()
            }
        );
        assert!(tracker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_passes_query_verbatim() {
        let root = docs_root();
        let tracker = Arc::new(RecordingTracker::default());
        let analyzer = analyzer(
            Arc::new(FixedChat("project = OPS AND status = Open")),
            tracker.clone(),
            root.path(),
        )
        .await;

        let response = analyzer.respond("open OPS issues").await;
        match response {
            AnalyzeResponse::Success { jql_query, results } => {
                assert_eq!(jql_query, "project = OPS AND status = Open");
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].key, "OPS-7");
                assert_eq!(results[0].assignee, "Unassigned");
                assert_eq!(results[0].priority, "None");
            }
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(
            *tracker.calls.lock().unwrap(),
            vec![("project = OPS AND status = Open".to_string(), 10)]
        );
    }

    #[tokio::test]
    async fn test_answer_without_exact_marker_is_searched() {
        for answer in ["summary ~ \"i'm NOT sure\"", ""] {
            let root = docs_root();
            let tracker = Arc::new(RecordingTracker::default());
            let analyzer = analyzer(Arc::new(FixedChat(answer)), tracker.clone(), root.path()).await;

            match analyzer.respond("issues mentioning doubt").await {
                AnalyzeResponse::Success { jql_query, .. } => assert_eq!(jql_query, answer),
                other => panic!("unexpected response: {:?}", other),
            }
            assert_eq!(
                *tracker.calls.lock().unwrap(),
                vec![(answer.to_string(), 10)]
            );
        }
    }

    #[tokio::test]
    async fn test_failure_becomes_error_envelope() {
        let root = docs_root();
        let tracker = Arc::new(RecordingTracker::default());
        let analyzer = analyzer(Arc::new(FailingChat), tracker.clone(), root.path()).await;

        let response = analyzer.respond("open OPS issues").await;
        assert_eq!(
            response,
            AnalyzeResponse::Error {
                message: "Error processing query: rate limited".to_string()
            }
        );
        assert!(tracker.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_index_is_error_envelope() {
        let store = VectorStoreManager::new(Arc::new(ConstEmbedder), Arc::new(InMemoryIndex::new()));
        let analyzer = JqlAnalyzer::new(
            DocumentProcessor::default(),
            QueryEngine::new(store, Arc::new(FixedChat("project = OPS"))),
            Arc::new(RecordingTracker::default()),
        );
        match analyzer.respond("anything").await {
            AnalyzeResponse::Error { message } => {
                assert_eq!(message, "Error processing query: vector store not initialized")
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_context_appends_new_docs() {
        let root = docs_root();
        let analyzer = analyzer(
            Arc::new(FixedChat("project = OPS")),
            Arc::new(RecordingTracker::default()),
            root.path(),
        )
        .await;

        let extra = TempDir::new().unwrap();
        let jql = extra.path().join("jql");
        std::fs::create_dir_all(&jql).unwrap();
        std::fs::write(jql.join("more.txt"), "priority = High").unwrap();

        let context = serde_json::json!({
            "new_docs": extra.path().to_string_lossy(),
            "session": "ignored"
        });
        analyzer.update_context(&context).await.unwrap();
        assert_eq!(analyzer.engine.read().await.store().count().await.unwrap(), 2);

        analyzer
            .update_context(&serde_json::json!({"user": "x"}))
            .await
            .unwrap();
        assert_eq!(analyzer.engine.read().await.store().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_context_rejects_bad_new_docs() {
        let root = docs_root();
        let analyzer = analyzer(
            Arc::new(FixedChat("project = OPS")),
            Arc::new(RecordingTracker::default()),
            root.path(),
        )
        .await;
        assert!(analyzer
            .update_context(&serde_json::json!({"new_docs": 42}))
            .await
            .is_err());
        assert!(analyzer
            .update_context(&serde_json::json!(["not", "an", "object"]))
            .await
            .is_err());
    }

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_value(AnalyzeResponse::Unclear {
            message: UNCLEAR_MESSAGE.to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "unclear");
        assert_eq!(json["message"], UNCLEAR_MESSAGE);

        let json = serde_json::to_value(AnalyzeResponse::Success {
            jql_query: "project = OPS".to_string(),
            results: vec![],
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "success", "jql_query": "project = OPS", "results": []})
        );
    }
}
