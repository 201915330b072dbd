//! End-to-end tests of the processing, retrieval and orchestration path
//! with the external services replaced by fakes.

mod common;

use common::{write_docs, FakeTracker, ScriptedChat, VocabEmbedder};
use jql_analyzer::analyzer::{AnalyzeResponse, JqlAnalyzer, UNCLEAR_MESSAGE};
use jql_analyzer::engine::QueryEngine;
use jql_analyzer::index::SqliteIndex;
use jql_analyzer::models::{DocType, MetadataFilter};
use jql_analyzer::processor::DocumentProcessor;
use jql_analyzer::store::VectorStoreManager;
use std::sync::Arc;
use tempfile::TempDir;

async fn sqlite_store(dir: &TempDir) -> VectorStoreManager {
    let index = SqliteIndex::open(&dir.path().join("index")).await.unwrap();
    VectorStoreManager::new(Arc::new(VocabEmbedder), Arc::new(index))
}

#[tokio::test]
async fn test_processed_chunks_carry_source_and_type() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());

    let chunks = DocumentProcessor::default().process(tmp.path()).unwrap();
    // 1 cheat sheet + 2 fields + 2 history groups, all below chunk size.
    assert_eq!(chunks.len(), 5);
    for chunk in &chunks {
        assert!(!chunk.metadata.source.is_empty());
        assert!(DocType::parse(chunk.metadata.doc_type.as_str()).is_some());
    }

    let ops_bug = chunks
        .iter()
        .find(|c| c.metadata.get("project") == Some("OPS"))
        .unwrap();
    assert!(ops_bug
        .content
        .contains("Payment page times out || Login loop on SSO"));
    assert!(ops_bug.content.ends_with("Frequency: 2 occurrences"));
}

#[tokio::test]
async fn test_store_search_with_filter_on_sqlite() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());
    let chunks = DocumentProcessor::default().process(tmp.path()).unwrap();

    let mut store = sqlite_store(&tmp).await;
    store.initialize(&chunks).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 5);

    let hits = store.search("priority", 1, None).await.unwrap();
    assert_eq!(hits[0].metadata.get("field_name"), Some("Priority"));

    let mut filter = MetadataFilter::new();
    filter.insert("type".to_string(), "historical_summary".to_string());
    let hits = store.search("priority", 5, Some(&filter)).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits
        .iter()
        .all(|d| d.metadata.doc_type == DocType::HistoricalSummary));

    let context = store
        .assemble_context("sprint", Some(&filter))
        .await
        .unwrap();
    assert!(context.starts_with("Source: issues.csv\nType: historical_summary\n"));
}

#[tokio::test]
async fn test_analyzer_success_round() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());

    let chat = Arc::new(ScriptedChat::new(
        "project = OPS AND priority = High AND issuetype = Bug",
    ));
    let tracker = Arc::new(FakeTracker::default());
    let engine = QueryEngine::new(sqlite_store(&tmp).await, chat.clone());
    let analyzer = JqlAnalyzer::new(DocumentProcessor::default(), engine, tracker.clone());
    analyzer.initialize(tmp.path()).await.unwrap();

    let response = analyzer.respond("high priority OPS bugs").await;
    let (jql_query, results) = match response {
        AnalyzeResponse::Success { jql_query, results } => (jql_query, results),
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(
        jql_query,
        "project = OPS AND priority = High AND issuetype = Bug"
    );
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].assignee, "Sam Okafor");
    assert_eq!(results[1].assignee, "Unassigned");
    assert_eq!(results[1].priority, "None");

    assert_eq!(
        *tracker.searches.lock().unwrap(),
        vec![(jql_query.clone(), 10)]
    );

    let prompts = chat.prompts.lock().unwrap();
    assert!(prompts[0].contains("Question: high priority OPS bugs"));
    assert!(prompts[0].contains("Type: field_documentation"));
}

#[tokio::test]
async fn test_analyzer_unclear_never_searches() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());

    let tracker = Arc::new(FakeTracker::default());
    let engine = QueryEngine::new(
        sqlite_store(&tmp).await,
        Arc::new(ScriptedChat::new("I'm not sure which project you mean.")),
    );
    let analyzer = JqlAnalyzer::new(DocumentProcessor::default(), engine, tracker.clone());
    analyzer.initialize(tmp.path()).await.unwrap();

    assert_eq!(
        analyzer.respond("the thing from last week").await,
        AnalyzeResponse::Unclear {
            message: UNCLEAR_MESSAGE.to_string()
        }
    );
    assert!(tracker.searches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_context_update_extends_index() {
    let tmp = TempDir::new().unwrap();
    write_docs(tmp.path());

    let chat = Arc::new(ScriptedChat::new("assignee = currentUser()"));
    let engine = QueryEngine::new(sqlite_store(&tmp).await, chat.clone());
    let analyzer = JqlAnalyzer::new(
        DocumentProcessor::default(),
        engine,
        Arc::new(FakeTracker::default()),
    );
    analyzer.initialize(tmp.path()).await.unwrap();

    let extra = TempDir::new().unwrap();
    std::fs::create_dir_all(extra.path().join("jql")).unwrap();
    std::fs::write(
        extra.path().join("jql").join("assignee.txt"),
        "assignee assignee assignee = currentUser()",
    )
    .unwrap();

    analyzer
        .update_context(&serde_json::json!({ "new_docs": extra.path() }))
        .await
        .unwrap();

    analyzer.respond("my assignee issues").await;
    let prompts = chat.prompts.lock().unwrap();
    assert!(prompts[0].contains("Source: assignee.txt"));
}

#[tokio::test]
async fn test_malformed_docs_fail_initialization() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir_all(tmp.path().join("fields")).unwrap();
    std::fs::write(tmp.path().join("fields").join("bad.json"), "[{").unwrap();

    let engine = QueryEngine::new(
        sqlite_store(&tmp).await,
        Arc::new(ScriptedChat::new("project = OPS")),
    );
    let analyzer = JqlAnalyzer::new(
        DocumentProcessor::default(),
        engine,
        Arc::new(FakeTracker::default()),
    );
    assert!(analyzer.initialize(tmp.path()).await.is_err());
}
