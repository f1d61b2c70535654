//! External collaborators: the chat-completion model and the TTS engine.
//!
//! The dialogue pipeline only sees the [`ChatCollaborator`] and
//! [`SpeechCollaborator`] traits. The OpenAI-compatible HTTP adapters here are
//! thin: one request, one response, no retries.

pub mod chat;
pub mod speech;

use thiserror::Error;

pub use chat::{ChatCollaborator, GenerationParams, OpenAiChatClient};
pub use speech::{available_voices, OpenAiSpeechClient, SpeechCollaborator, SynthesisParams, VoiceInfo};

/// Failure talking to a remote provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection, timeout or body read failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Provider answered 2xx but the payload was unusable.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Shorten a provider body for logs and error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 500;
    match body.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}
