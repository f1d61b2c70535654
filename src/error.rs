//! Pipeline-level errors and their HTTP mapping.

use axum::http::StatusCode;
use thiserror::Error;

use crate::providers::ProviderError;

/// Errors surfaced by the dialogue orchestrator.
///
/// TTS failures never appear here: the speech path degrades to a text
/// fallback instead.
#[derive(Debug, Error)]
pub enum DialogueError {
    #[error("messages must be a non-empty list of turns")]
    InvalidMessages,

    #[error("text is required for speech synthesis")]
    MissingText,

    #[error("chat service unavailable: {0}")]
    ChatProvider(#[from] ProviderError),
}

impl DialogueError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            DialogueError::InvalidMessages => "INVALID_MESSAGES",
            DialogueError::MissingText => "MISSING_TEXT",
            DialogueError::ChatProvider(_) => "LLM_SERVICE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DialogueError::InvalidMessages | DialogueError::MissingText => StatusCode::BAD_REQUEST,
            DialogueError::ChatProvider(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// `{"error": {"message", "code"}}` body.
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": self.code(),
            }
        })
    }
}
