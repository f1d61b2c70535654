//! The dialogue augmentation pipeline.
//!
//! Everything that decides what reaches the language model and how its reply
//! sounds when spoken. [`Orchestrator`] wires the stages together; each stage
//! is usable on its own.

pub mod compactor;
pub mod expressive;
pub mod keywords;
pub mod orchestrator;
pub mod skill;
pub mod talent;

pub use compactor::{compact, estimate_tokens, HistoryCompactor};
pub use expressive::{speak, speak_with};
pub use keywords::{extract_keywords, CueKind};
pub use orchestrator::{
    Augmentation, ChatReply, ChatRequest, Orchestrator, SpeechOutcome, SpeechRequest,
    VoiceOverrides,
};
pub use skill::{SkillDirective, SkillState, SkillStateStore, SkillTrigger, SkillTriggerEngine};
pub use talent::detect_talent;
