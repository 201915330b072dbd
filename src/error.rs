//! Typed error conditions.
//!
//! Most of the crate propagates failures as [`anyhow::Error`]. The
//! conditions below are the ones callers need to tell apart; they travel
//! inside `anyhow` and can be recovered with `downcast_ref`.

use thiserror::Error;

/// Failures while turning a document root into documents.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid field documentation in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid history file {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("history file {path} is missing required column '{column}'")]
    MissingColumn { path: String, column: String },
}

/// Vector store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Search was attempted before any documents were indexed.
    #[error("vector store not initialized")]
    NotInitialized,

    #[error("embedding provider returned {got} vectors for {expected} texts")]
    EmbeddingCount { expected: usize, got: usize },
}

/// Issue tracker failures.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("issue tracker not configured: {0}")]
    NotConfigured(String),

    #[error("issue tracker request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("issue tracker returned {status}: {body}")]
    Status { status: u16, body: String },
}
