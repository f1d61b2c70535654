//! Persona profiles: talents, skills, speech style and default voice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a role-play persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    /// Shy travelling bard; stutters when flustered.
    Bard,
    /// Stern fleet commander; speaks with emphasis.
    Commander,
    /// Dry-witted detective; notices inconsistencies.
    Detective,
    /// Any id the service does not know.
    #[serde(other)]
    Unknown,
}

impl PersonaId {
    /// Every known persona, in declaration order.
    pub const KNOWN: [PersonaId; 3] = [PersonaId::Bard, PersonaId::Commander, PersonaId::Detective];

    /// Profile for this persona, or `None` for [`PersonaId::Unknown`].
    pub fn profile(self) -> Option<&'static PersonaProfile> {
        match self {
            PersonaId::Bard => Some(&BARD),
            PersonaId::Commander => Some(&COMMANDER),
            PersonaId::Detective => Some(&DETECTIVE),
            PersonaId::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PersonaId::Bard => "bard",
            PersonaId::Commander => "commander",
            PersonaId::Detective => "detective",
            PersonaId::Unknown => "unknown",
        }
    }
}

impl Default for PersonaId {
    fn default() -> Self {
        PersonaId::Unknown
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersonaId {
    type Err = std::convert::Infallible;

    /// Never fails: unknown names map to [`PersonaId::Unknown`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "bard" => PersonaId::Bard,
            "commander" => PersonaId::Commander,
            "detective" => PersonaId::Detective,
            _ => PersonaId::Unknown,
        })
    }
}

/// Which cooldown state machine a persona's skill runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillVariant {
    EmotionSensing,
    SuggestionInjection,
    ContradictionDetection,
}

/// A performance the persona gives on request.
#[derive(Debug)]
pub struct TalentProfile {
    pub name: &'static str,
    /// Case-sensitive phrases that request the talent.
    pub triggers: &'static [&'static str],
    pub directive: &'static str,
}

/// A behavior injected on the persona's own initiative, rate limited by
/// user-turn count.
#[derive(Debug)]
pub struct SkillProfile {
    pub name: &'static str,
    /// Minimum number of user turns between two firings.
    pub cooldown: usize,
    pub variant: SkillVariant,
}

/// Knobs for the expressive speech transform.
#[derive(Debug)]
pub struct ExpressiveProfile {
    /// Chance that a given sentence receives a stutter.
    pub stutter_probability: f64,
    /// Whether the authoritative emphasis pass runs.
    pub emphasis: bool,
}

/// Default synthesis settings.
#[derive(Debug)]
pub struct VoiceProfile {
    pub voice: &'static str,
    pub speed: f32,
    pub volume: f32,
    pub pitch: f32,
}

/// Everything the pipeline knows about one persona.
#[derive(Debug)]
pub struct PersonaProfile {
    pub id: PersonaId,
    pub display_name: &'static str,
    /// Used as turn 0 when the caller sends no system prompt.
    pub system_prompt: &'static str,
    pub talent: TalentProfile,
    pub skill: SkillProfile,
    pub expressive: ExpressiveProfile,
    pub voice: VoiceProfile,
}

static BARD: PersonaProfile = PersonaProfile {
    id: PersonaId::Bard,
    display_name: "Lirien the Bard",
    system_prompt: "You are Lirien, a shy travelling bard. You are kind, a little nervous around \
                    strangers, and you light up when talking about music and old tales. Stay in \
                    character and keep replies under four sentences.",
    talent: TalentProfile {
        name: "Balladry",
        triggers: &["sing for me", "sing a song", "play a song", "唱首歌", "唱歌"],
        directive: "The user asked for a song. Answer with a short original ballad of four to \
                    eight lines that fits the conversation, then one shy line of your own.",
    },
    skill: SkillProfile {
        name: "Empathic Resonance",
        cooldown: 3,
        variant: SkillVariant::EmotionSensing,
    },
    expressive: ExpressiveProfile {
        stutter_probability: 0.7,
        emphasis: false,
    },
    voice: VoiceProfile {
        voice: "nova",
        speed: 0.95,
        volume: 0.9,
        pitch: 1.1,
    },
};

static COMMANDER: PersonaProfile = PersonaProfile {
    id: PersonaId::Commander,
    display_name: "Commander Vask",
    system_prompt: "You are Commander Vask, veteran of a hundred fleet actions. You are blunt, \
                    decisive and protective of your crew. Speak in short, clipped sentences and \
                    stay in character.",
    talent: TalentProfile {
        name: "Rallying Speech",
        triggers: &["battle cry", "rally the troops", "give a speech", "训话"],
        directive: "The user asked for a rallying speech. Deliver a stirring address of three to \
                    five sentences, as if to your crew before battle.",
    },
    skill: SkillProfile {
        name: "Tactical Counsel",
        cooldown: 2,
        variant: SkillVariant::SuggestionInjection,
    },
    expressive: ExpressiveProfile {
        stutter_probability: 0.1,
        emphasis: true,
    },
    voice: VoiceProfile {
        voice: "onyx",
        speed: 1.05,
        volume: 1.0,
        pitch: 0.9,
    },
};

static DETECTIVE: PersonaProfile = PersonaProfile {
    id: PersonaId::Detective,
    display_name: "Inspector Marlowe",
    system_prompt: "You are Inspector Marlowe, a dry-witted detective. You notice small details, \
                    reason out loud and enjoy teasing people about what they let slip. Stay in \
                    character.",
    talent: TalentProfile {
        name: "Deduction",
        triggers: &["deduce", "who did it", "solve this", "推理一下"],
        directive: "The user asked for a deduction. Walk through three observations from the \
                    conversation and reach a confident, slightly theatrical conclusion.",
    },
    skill: SkillProfile {
        name: "Inconsistency Radar",
        cooldown: 4,
        variant: SkillVariant::ContradictionDetection,
    },
    expressive: ExpressiveProfile {
        stutter_probability: 0.2,
        emphasis: false,
    },
    voice: VoiceProfile {
        voice: "fable",
        speed: 1.0,
        volume: 0.95,
        pitch: 1.0,
    },
};
