//! # JQL Analyzer
//!
//! Translates natural-language questions about Jira issues into JQL by
//! retrieval-augmented generation, then runs the query against Jira.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  docs root   │──▶│  Processor  │──▶│ Vector store │
//! │ jql/ fields/ │   │ extract +   │   │ embed + index│
//! │ history/     │   │ chunk       │   │ (SQLite)     │
//! └──────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │ top-k context
//!                    ┌─────────────┐   ┌──────▼───────┐
//!   question ───────▶│  Analyzer   │──▶│ Query engine │──▶ chat model
//!                    │             │◀──│ Generation   │
//!                    └──────┬──────┘   └──────────────┘
//!                           │ JQL
//!                           ▼
//!                      Jira search ──▶ { status, jql_query, results }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`models`] | Documents, metadata, and filters |
//! | [`chunk`] | Recursive character text splitting |
//! | [`processor`] | Cheat sheet, field and history extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Similarity index backends |
//! | [`store`] | Vector store manager and context assembly |
//! | [`llm`] | Chat-completion provider abstraction |
//! | [`engine`] | Prompting and query generation |
//! | [`jira`] | Jira search client and issue records |
//! | [`analyzer`] | Request orchestration |
//! | [`server`] | HTTP endpoint |
//! | [`db`] | Database connection |
//! | [`migrate`] | Collection schema |
//! | [`error`] | Typed error conditions |

pub mod analyzer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod error;
mod http;
pub mod index;
pub mod jira;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod processor;
pub mod server;
pub mod store;
