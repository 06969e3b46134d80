//! Ollama `/api/chat` client and a bounded-retry wrapper.
//!
//! Grounded on `pipeline::structuring::ollama.rs`'s `OllamaClient`/
//! `MockLlmClient` shape and `orchestrator::call_llm_with_retry`'s
//! retry-loop logging, retargeted at the `/api/chat` + `format`
//! JSON-schema wire contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmError;
use crate::extraction::llm::{ChatMessage, LlmClient, OllamaResponse};

/// HTTP client for a local Ollama runtime.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        OllamaClient { base_url: base_url.trim_end_matches('/').to_string(), client, timeout_secs }
    }

    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", 600)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponseBody {
    message: ChatResponseMessage,
    #[serde(default)]
    model: String,
    #[serde(default)]
    total_duration: u64,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagsModel>,
}

#[derive(Deserialize)]
struct TagsModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&Value>,
    ) -> Result<OllamaResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest { model, messages, stream: false, options: ChatOptions { temperature: 0.0 }, format };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                LlmError::Timeout(self.timeout_secs)
            } else {
                LlmError::Connection(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(LlmError::ModelNotFound(model.to_string()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Http { status: status.as_u16(), body });
        }

        let parsed: ChatResponseBody =
            response.json().map_err(|e| LlmError::ResponseUnparseable(e.to_string()))?;

        Ok(OllamaResponse {
            content: parsed.message.content,
            model: parsed.model,
            total_duration_ns: parsed.total_duration,
            prompt_eval_count: parsed.prompt_eval_count,
            eval_count: parsed.eval_count,
        })
    }

    fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else {
                LlmError::Connection(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(LlmError::Http { status: response.status().as_u16(), body: response.text().unwrap_or_default() });
        }

        let parsed: TagsResponse = response.json().map_err(|e| LlmError::ResponseUnparseable(e.to_string()))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }
}

/// Canned-response client for tests.
pub struct MockLlmClient {
    response: String,
    available_models: Vec<String>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        MockLlmClient { response: response.to_string(), available_models: vec!["qwen3:4b-instruct".to_string()] }
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }
}

impl LlmClient for MockLlmClient {
    fn chat(&self, model: &str, _messages: &[ChatMessage], _format: Option<&Value>) -> Result<OllamaResponse, LlmError> {
        Ok(OllamaResponse { content: self.response.clone(), model: model.to_string(), ..Default::default() })
    }

    fn list_models(&self) -> Result<Vec<String>, LlmError> {
        Ok(self.available_models.clone())
    }
}

/// Retries a chat call up to `max_retries` times beyond the first
/// attempt, with a fixed `retry_delay` between attempts, warning and
/// continuing on retryable errors and propagating non-retryable ones
/// immediately — mirrors `orchestrator::call_llm_with_retry`'s shape.
pub fn call_with_retry(
    client: &dyn LlmClient,
    model: &str,
    messages: &[ChatMessage],
    format: Option<&Value>,
    max_retries: u32,
    retry_delay: std::time::Duration,
) -> Result<OllamaResponse, LlmError> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match client.chat(model, messages, format) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                tracing::warn!(attempt = attempt + 1, error = %e, "LLM call failed, retrying");
                last_error = Some(e);
                std::thread::sleep(retry_delay);
                continue;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or(LlmError::ResponseUnparseable("no attempts made".to_string())))
}
