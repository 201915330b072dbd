//! Fakes for the embedding, chat and issue-tracker seams, plus a sample
//! document tree.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use jql_analyzer::embedding::Embedder;
use jql_analyzer::jira::{Issue, IssueFields, IssueTracker, JiraUser, NamedValue};
use jql_analyzer::llm::ChatModel;
use std::path::Path;
use std::sync::Mutex;

/// Bag-of-words embedder over a small fixed vocabulary.
pub struct VocabEmbedder;

const VOCAB: [&str; 6] = ["status", "priority", "project", "bug", "assignee", "sprint"];

#[async_trait]
impl Embedder for VocabEmbedder {
    fn model_name(&self) -> &str {
        "vocab"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Answers every prompt with a fixed string and records the prompts.
pub struct ScriptedChat {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Returns two canned issues and records every search.
#[derive(Default)]
pub struct FakeTracker {
    pub searches: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn search_issues(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>> {
        self.searches
            .lock()
            .unwrap()
            .push((jql.to_string(), max_results));
        Ok(vec![
            Issue {
                key: "OPS-101".to_string(),
                fields: IssueFields {
                    summary: Some("Payment page times out".to_string()),
                    status: Some(NamedValue {
                        name: Some("In Progress".to_string()),
                    }),
                    assignee: Some(JiraUser {
                        display_name: Some("Sam Okafor".to_string()),
                    }),
                    priority: Some(NamedValue {
                        name: Some("High".to_string()),
                    }),
                    created: Some("2024-03-01T09:00:00.000+0000".to_string()),
                    updated: Some("2024-03-02T09:00:00.000+0000".to_string()),
                },
            },
            Issue {
                key: "OPS-102".to_string(),
                fields: IssueFields {
                    summary: Some("Checkout button misaligned".to_string()),
                    ..IssueFields::default()
                },
            },
        ])
    }
}

/// Write a document tree with one file of each kind under `root`.
pub fn write_docs(root: &Path) {
    let jql = root.join("jql");
    let fields = root.join("fields");
    let history = root.join("history");
    for dir in [&jql, &fields, &history] {
        std::fs::create_dir_all(dir).unwrap();
    }

    std::fs::write(
        jql.join("basics.md"),
        "# JQL basics\n\nUse status = \"In Progress\" to find active work.\n\nSprint queries: sprint in openSprints()",
    )
    .unwrap();
    std::fs::write(
        fields.join("fields.json"),
        r#"[
            {"name": "Priority", "type": "priority", "description": "Issue priority",
             "searchable": true, "operators": ["=", "!=", "IN"]},
            {"name": "Assignee", "type": "user"}
        ]"#,
    )
    .unwrap();
    std::fs::write(
        history.join("issues.csv"),
        "project,issue_type,priority,summary,count\n\
         OPS,Bug,High,Payment page times out,1\n\
         OPS,Bug,High,Login loop on SSO,1\n\
         WEB,Story,Low,Dark mode,1\n",
    )
    .unwrap();
}
