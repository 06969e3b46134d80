//! Crate-wide error taxonomy.
//!
//! One `thiserror` enum per subsystem, mirroring how the rest of this
//! workspace scopes errors (see `pipeline::structuring::StructuringError`):
//! a dedicated LLM error family with a retryability predicate, a schema
//! error family for programming-error lookups, and a crate-level
//! umbrella that wraps both. Vocabulary and source-span outcomes are
//! deliberately *not* represented here — they only toggle `flagged` /
//! `vocab_valid` on an `ExtractionValue`, never propagate as `Result`.

use thiserror::Error;

/// Errors from the local LLM runtime client.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("could not connect to LLM runtime at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM runtime returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("model '{0}' not found on LLM runtime")]
    ModelNotFound(String),

    #[error("could not parse LLM response as JSON: {0}")]
    ResponseUnparseable(String),
}

impl LlmError {
    /// Per spec.md §7: connection failures, timeouts and HTTP errors are
    /// retryable; model-not-found and unparseable responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Connection(_) | LlmError::Timeout(_) | LlmError::Http { .. })
    }
}

/// Programming-error lookups against the field/routing registries.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
}

/// Crate-level umbrella error.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_timeout_and_http_are_retryable() {
        assert!(LlmError::Connection("x".into()).is_retryable());
        assert!(LlmError::Timeout(60).is_retryable());
        assert!(LlmError::Http { status: 500, body: String::new() }.is_retryable());
    }

    #[test]
    fn model_not_found_and_unparseable_are_not_retryable() {
        assert!(!LlmError::ModelNotFound("qwen3".into()).is_retryable());
        assert!(!LlmError::ResponseUnparseable("bad json".into()).is_retryable());
    }

    #[test]
    fn umbrella_wraps_schema_error() {
        let e: ExtractionError = SchemaError::UnknownField("nope".into()).into();
        assert!(matches!(e, ExtractionError::Schema(_)));
    }
}
