//! Conversation turns and caller-supplied flow hints.

use serde::{Deserialize, Serialize};

/// Author of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a conversation.
///
/// Turn 0 of a conversation is the persona's system prompt and is never
/// dropped by compaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Caller's assessment of whether the conversation is stalling.
///
/// Opaque input: the pipeline never computes it, it only reacts to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowHint {
    #[default]
    Normal,
    NeedPrompt,
    NeedTopicChange,
    NeedInitiative,
}

impl FlowHint {
    /// Steering line appended to the system prompt, if the hint asks for one.
    pub fn nudge(self) -> Option<&'static str> {
        match self {
            FlowHint::Normal => None,
            FlowHint::NeedPrompt => Some(
                "The user seems unsure what to say. End your reply with a light, concrete question they can answer easily.",
            ),
            FlowHint::NeedTopicChange => Some(
                "The current topic has run dry. Gently steer toward a fresh subject that fits your character.",
            ),
            FlowHint::NeedInitiative => Some(
                "Take the initiative this turn: propose something to do or share a short story of your own.",
            ),
        }
    }
}
