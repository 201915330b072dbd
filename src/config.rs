//! TOML configuration.
//!
//! Every section is optional and falls back to its defaults. Jira
//! credentials may be overridden from the environment (`JIRA_SERVER`,
//! `JIRA_EMAIL`); the API token is read only from `JIRA_API_TOKEN`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub jira: JiraConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    #[serde(default = "default_docs_root")]
    pub root: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            root: default_docs_root(),
        }
    }
}

fn default_docs_root() -> PathBuf {
    PathBuf::from("./data/docs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
    /// `"sqlite"` (persisted) or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Number of chunks retrieved per question.
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            persist_dir: default_persist_dir(),
            backend: default_backend(),
            k: default_k(),
        }
    }
}

fn default_persist_dir() -> PathBuf {
    PathBuf::from("./data/index")
}
fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: Option<String>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> Option<String> {
    Some("text-embedding-ada-002".to_string())
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            temperature: 0.0,
            max_retries: 0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

/// Jira connection settings. The API token is only ever read from
/// `JIRA_API_TOKEN`; `JIRA_SERVER` and `JIRA_EMAIL` override the file.
#[derive(Debug, Deserialize, Clone)]
pub struct JiraConfig {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            server: None,
            email: None,
            max_results: default_max_results(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_results() -> usize {
    10
}

impl JiraConfig {
    /// Apply `JIRA_SERVER` / `JIRA_EMAIL` from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(server) = std::env::var("JIRA_SERVER") {
            self.server = Some(server);
        }
        if let Ok(email) = std::env::var("JIRA_EMAIL") {
            self.email = Some(email);
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    config.jira.apply_env();
    Ok(config)
}

/// Like [`load_config`], but falls back to defaults when the file is absent.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    let mut config = Config::default();
    validate(&config)?;
    config.jira.apply_env();
    Ok(config)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap > config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must not exceed chunking.chunk_size");
    }

    if config.vector_store.k == 0 {
        anyhow::bail!("vector_store.k must be >= 1");
    }
    match config.vector_store.backend.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!(
            "Unknown vector_store.backend: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    if config.jira.max_results == 0 {
        anyhow::bail!("jira.max_results must be >= 1");
    }

    Ok(())
}
