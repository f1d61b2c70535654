//! # roleplay-voice
//!
//! Role-play chat backend. Forwards conversations to an OpenAI-compatible
//! language model and TTS endpoint while layering persona behavior on top:
//! bounded history compaction, cooldown-gated skills, talent requests and an
//! expressive (stuttering, emphatic) speech transform.

pub mod config;
pub mod dialogue;
pub mod error;
pub mod persona;
pub mod providers;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use dialogue::{ChatReply, ChatRequest, Orchestrator, SpeechOutcome, SpeechRequest};
pub use error::DialogueError;
pub use persona::PersonaId;
pub use types::{FlowHint, Role, Turn};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
