//! # JQL Analyzer CLI (`jqla`)
//!
//! ## Usage
//!
//! ```bash
//! jqla --config ./config/jqla.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jqla serve` | Index the document root and start the HTTP server |
//! | `jqla ingest [ROOT]` | Process a document root and print per-type counts (no network) |
//! | `jqla context "<query>"` | Index the document root and print the retrieved context |
//! | `jqla ask "<question>"` | Answer one question and print the response envelope |
//!
//! Credentials (`OPENAI_API_KEY`, `JIRA_SERVER`, `JIRA_EMAIL`,
//! `JIRA_API_TOKEN`) are read from the environment, and from `.env` when
//! present. Log verbosity follows `RUST_LOG`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jql_analyzer::analyzer::JqlAnalyzer;
use jql_analyzer::chunk::TextSplitter;
use jql_analyzer::config::{load_config_or_default, Config};
use jql_analyzer::models::{DocType, MetadataFilter};
use jql_analyzer::processor::DocumentProcessor;
use jql_analyzer::server::run_server;
use jql_analyzer::store::VectorStoreManager;

/// Translate natural-language questions into JQL using retrieved Jira
/// documentation, and run them against Jira.
#[derive(Parser)]
#[command(name = "jqla", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is absent.
    #[arg(long, global = true, default_value = "./config/jqla.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index `[docs].root` and serve `POST /analyze`.
    Serve,

    /// Process a document root and print document and chunk counts.
    ///
    /// Nothing is embedded or stored.
    Ingest {
        /// Document root; defaults to `[docs].root`.
        root: Option<PathBuf>,
    },

    /// Index `[docs].root` and print the context retrieved for a query.
    Context {
        query: String,

        /// Restrict retrieval to one document type
        /// (`jql_cheatsheet`, `field_documentation`, `historical_summary`).
        #[arg(long = "type")]
        doc_type: Option<String>,

        /// Number of chunks to retrieve.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer one question and print the JSON response.
    Ask { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jql_analyzer=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let analyzer = Arc::new(JqlAnalyzer::from_config(&config).await?);
            run_server(&config, analyzer).await?;
        }
        Commands::Ingest { root } => {
            let root = root.unwrap_or_else(|| config.docs.root.clone());
            run_ingest(&config, &root)?;
        }
        Commands::Context { query, doc_type, k } => {
            run_context(&config, &query, doc_type.as_deref(), k).await?;
        }
        Commands::Ask { text } => {
            let analyzer = JqlAnalyzer::from_config(&config).await?;
            let response = analyzer.respond(&text).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn processor(config: &Config) -> Result<DocumentProcessor> {
    let splitter = TextSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    Ok(DocumentProcessor::new(splitter))
}

fn run_ingest(config: &Config, root: &Path) -> Result<()> {
    let chunks = processor(config)?.process(root)?;

    let mut per_type: BTreeMap<DocType, (usize, BTreeSet<String>)> = BTreeMap::new();
    for chunk in &chunks {
        let entry = per_type.entry(chunk.metadata.doc_type).or_default();
        entry.0 += 1;
        entry.1.insert(chunk.metadata.source.clone());
    }

    println!("Processed {}", root.display());
    for (doc_type, (count, sources)) in &per_type {
        println!(
            "  {:<20} {:>5} chunks from {} file(s)",
            doc_type.as_str(),
            count,
            sources.len()
        );
    }
    println!("  {:<20} {:>5} chunks", "total", chunks.len());
    Ok(())
}

async fn run_context(
    config: &Config,
    query: &str,
    doc_type: Option<&str>,
    k: Option<usize>,
) -> Result<()> {
    let filter = match doc_type {
        Some(t) => {
            let parsed = DocType::parse(t)
                .ok_or_else(|| anyhow::anyhow!("Unknown document type: {}", t))?;
            let mut filter = MetadataFilter::new();
            filter.insert("type".to_string(), parsed.as_str().to_string());
            Some(filter)
        }
        None => None,
    };

    let documents = processor(config)?.process(&config.docs.root)?;
    let mut store = VectorStoreManager::from_config(config).await?;
    if let Some(k) = k {
        store = store.with_k(k);
    }
    store.initialize(&documents).await?;

    let context = store.assemble_context(query, filter.as_ref()).await?;
    if context.is_empty() {
        println!("No matching context.");
    } else {
        println!("{}", context);
    }
    Ok(())
}
