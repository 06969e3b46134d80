//! `LlmClient` trait and response types for the Tier-2 extractor.
//!
//! Grounded on `pipeline::structuring::ollama.rs`'s `LlmClient` trait
//! shape, retargeted at the `/api/chat` + `format` JSON-schema wire
//! contract described by the external interface section, rather than
//! the teacher's `/api/generate` + flat `prompt`/`system`.

use crate::error::LlmError;

/// One chat message in an Ollama `/api/chat` request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: "user", content: content.into() }
    }
}

/// Parsed Ollama response, with the raw runtime metadata surfaced for
/// diagnostics (not required by the wire contract, but present on every
/// `/api/chat` response and harmless to carry).
#[derive(Debug, Clone, Default)]
pub struct OllamaResponse {
    pub content: String,
    pub model: String,
    pub total_duration_ns: u64,
    pub prompt_eval_count: u64,
    pub eval_count: u64,
}

impl OllamaResponse {
    pub fn total_duration_ms(&self) -> f64 {
        self.total_duration_ns as f64 / 1_000_000.0
    }
}

/// A schema-constrained chat completion call against a local LLM
/// runtime, plus model discovery for health checks.
pub trait LlmClient {
    fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        format: Option<&serde_json::Value>,
    ) -> Result<OllamaResponse, LlmError>;

    fn list_models(&self) -> Result<Vec<String>, LlmError>;

    fn is_model_available(&self, model: &str) -> Result<bool, LlmError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_constructors_set_role() {
        assert_eq!(ChatMessage::system("x").role, "system");
        assert_eq!(ChatMessage::user("y").role, "user");
    }

    #[test]
    fn total_duration_ms_converts_from_nanoseconds() {
        let r = OllamaResponse { total_duration_ns: 2_500_000, ..Default::default() };
        assert_eq!(r.total_duration_ms(), 2.5);
    }
}
