//! Chat-completion providers.
//!
//! The query engine only needs "prompt in, text out". [`ChatModel`] is
//! that seam; [`OpenAIChat`] and [`OllamaChat`] implement it over HTTP
//! with the configured temperature (zero by default, for deterministic
//! output). Responses are returned verbatim.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::http::send_with_retry;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A language model that completes a single prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Submit `prompt` and return the model's raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Placeholder used when `llm.provider = "disabled"`.
pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Language model provider is disabled")
    }
}

// ============ OpenAI ============

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions (`POST /v1/chat/completions`).
///
/// Requires `OPENAI_API_KEY`.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };
        let response = send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(OPENAI_CHAT_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no choices"))
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Local Ollama completions (`POST /api/generate`, non-streaming).
pub struct OllamaChat {
    model: String,
    temperature: f32,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let endpoint = format!("{}/api/generate", self.url);
        let response = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await?;

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response)
    }
}

/// Create the configured [`ChatModel`].
pub fn create_chat_model(config: &LlmConfig) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledChat)),
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
