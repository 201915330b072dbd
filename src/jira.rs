//! Issue tracker client.
//!
//! [`IssueTracker`] executes a JQL string and returns native issue
//! records. [`JiraClient`] implements it against the Jira REST API
//! (`POST /rest/api/2/search`, basic auth with account email and API
//! token). Native records are typed with every nested field optional and
//! are reduced to [`IssueSummary`] for responses.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::JiraConfig;
use crate::error::TrackerError;

/// Fields requested from the search endpoint.
pub const SEARCH_FIELDS: [&str; 6] = ["summary", "status", "assignee", "priority", "created", "updated"];

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Run `jql` and return at most `max_results` issues.
    async fn search_issues(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>>;
}

// ============ Native records ============

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: Option<NamedValue>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub priority: Option<NamedValue>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Status and priority objects; only the display name is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedValue {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraUser {
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

// ============ Simplified record ============

/// Flattened issue returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub assignee: String,
    pub priority: String,
    pub created: String,
    pub updated: String,
}

impl From<Issue> for IssueSummary {
    fn from(issue: Issue) -> Self {
        let IssueFields {
            summary,
            status,
            assignee,
            priority,
            created,
            updated,
        } = issue.fields;
        Self {
            key: issue.key,
            summary: summary.unwrap_or_default(),
            status: status.and_then(|s| s.name).unwrap_or_default(),
            assignee: assignee
                .and_then(|a| a.display_name)
                .unwrap_or_else(|| "Unassigned".to_string()),
            priority: priority
                .and_then(|p| p.name)
                .unwrap_or_else(|| "None".to_string()),
            created: created.unwrap_or_default(),
            updated: updated.unwrap_or_default(),
        }
    }
}

// ============ REST client ============

#[derive(Serialize)]
struct SearchRequest<'a> {
    jql: &'a str,
    #[serde(rename = "maxResults")]
    max_results: usize,
    fields: &'a [&'a str],
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

pub struct JiraClient {
    server: String,
    email: String,
    token: String,
    client: reqwest::Client,
}

impl JiraClient {
    pub fn new(server: &str, email: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            email: email.to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Build a client from `[jira]` settings and `JIRA_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// [`TrackerError::NotConfigured`] when the server, email or token is
    /// missing.
    pub fn from_config(config: &JiraConfig) -> Result<Self> {
        let server = config
            .server
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TrackerError::NotConfigured("JIRA_SERVER is not set".to_string()))?;
        let email = config
            .email
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TrackerError::NotConfigured("JIRA_EMAIL is not set".to_string()))?;
        let token = std::env::var("JIRA_API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TrackerError::NotConfigured("JIRA_API_TOKEN is not set".to_string()))?;
        Self::new(server, email, &token, config.timeout_secs)
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn search_issues(&self, jql: &str, max_results: usize) -> Result<Vec<Issue>> {
        let body = SearchRequest {
            jql,
            max_results,
            fields: &SEARCH_FIELDS,
        };
        debug!(server = %self.server, max_results, "searching issues");

        let response = self
            .client
            .post(format!("{}/rest/api/2/search", self.server))
            .basic_auth(&self.email, Some(&self.token))
            .json(&body)
            .send()
            .await
            .map_err(TrackerError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: SearchResponse = response.json().await.map_err(TrackerError::from)?;
        info!(issues = parsed.issues.len(), "issue search complete");
        Ok(parsed.issues)
    }
}
