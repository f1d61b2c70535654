//! Cooldown-gated persona skills.
//!
//! Each persona owns one skill that fires on its own initiative and injects a
//! behavioral directive into the prompt. Cooldowns are counted in user turns:
//! `n` is the number of user turns in the request, and a skill may only fire
//! again once `n - last_trigger_turn` reaches the persona's cooldown.
//!
//! The per-persona counters live in an explicit [`SkillStateStore`] shared by
//! all requests. Check-and-set runs under the store's per-key lock, so two
//! concurrent requests can never both fire inside one gate window. Updates are
//! visible immediately and are never rolled back, even if the reply that
//! carried the directive is lost.

use std::sync::Arc;

use dashmap::DashMap;
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use crate::persona::{PersonaId, SkillVariant};
use crate::types::Turn;

/// Chance that an off-cooldown suggestion skill actually fires.
pub const SUGGESTION_PROBABILITY: f64 = 0.3;

/// Chance of a generic probe when no contradiction was found.
pub const PROBE_PROBABILITY: f64 = 0.3;

const POSITIVE_TERMS: &[&str] = &[
    "happy", "glad", "great", "love", "wonderful", "awesome", "excited", "yay", "开心", "高兴",
    "太好了", "喜欢",
];
const NEGATIVE_TERMS: &[&str] = &[
    "sad", "angry", "upset", "tired", "hate", "awful", "terrible", "lonely", "难过", "生气", "累",
    "讨厌", "烦",
];
const CURIOUS_TERMS: &[&str] = &[
    "why", "how come", "what if", "wonder", "curious", "tell me about", "为什么", "怎么", "好奇",
];

/// (earlier rejection, later approval)
const OPPOSING_PAIRS: &[(&str, &str)] = &[
    ("don't like", "like"),
    ("do not like", "like"),
    ("hate", "love"),
    ("不喜欢", "喜欢"),
    ("讨厌", "爱"),
];

/// (earlier, later) time references that cannot describe the same event.
const TEMPORAL_PAIRS: &[(&str, &str)] = &[("yesterday", "tomorrow"), ("昨天", "明天")];

const SUGGESTION_TEMPLATES: [&str; 3] = [
    "Offer the user one concrete, practical next step, framed as a tactical recommendation.",
    "Point out one risk in the user's current situation and how to guard against it.",
    "Set the user a small challenge or drill to try before you speak again.",
];

const PROBE_TEMPLATES: [&str; 2] = [
    "Pick one small detail the user mentioned and ask about it as if it were a clue.",
    "Make a confident, slightly cheeky guess about the user's day and invite them to confirm or deny it.",
];

/// Mood of the latest user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Positive,
    Negative,
    Curious,
    Neutral,
}

impl Emotion {
    fn directive(self) -> &'static str {
        match self {
            Emotion::Positive => {
                "The user sounds happy. Share their joy warmly and build on what delighted them."
            }
            Emotion::Negative => {
                "The user sounds low or upset. Slow down, acknowledge the feeling first and offer gentle comfort."
            }
            Emotion::Curious => {
                "The user is curious. Reward it with a vivid detail or a small mystery of your own."
            }
            Emotion::Neutral => {
                "The user's mood is hard to read. Ask one soft question about how they are really doing."
            }
        }
    }
}

/// Classify text by keyword membership; positive beats negative beats curious.
pub fn classify_emotion(text: &str) -> Emotion {
    let lowered = text.to_lowercase();
    let hit = |terms: &[&str]| terms.iter().any(|t| contains_term(&lowered, t));
    if hit(POSITIVE_TERMS) {
        Emotion::Positive
    } else if hit(NEGATIVE_TERMS) {
        Emotion::Negative
    } else if hit(CURIOUS_TERMS) {
        Emotion::Curious
    } else {
        Emotion::Neutral
    }
}

/// Substring test that respects word boundaries for ASCII terms, so "hate"
/// does not fire inside "whatever". Non-ASCII terms match anywhere.
fn contains_term(haystack: &str, term: &str) -> bool {
    if !term.is_ascii() {
        return haystack.contains(term);
    }
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !is_word(before) && !is_word(after)
    })
}

/// Why a skill fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillTrigger {
    Emotion { emotion: Emotion },
    Suggestion,
    Contradiction,
    Probe,
}

/// A fired skill: the directive to inject and what caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillDirective {
    pub skill: &'static str,
    pub trigger: SkillTrigger,
    pub text: String,
}

impl SkillDirective {
    /// Block appended to the system prompt.
    pub fn block(&self) -> String {
        format!("\n\n[Skill: {}]\n{}", self.skill, self.text)
    }
}

/// Cooldown bookkeeping for one persona.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkillState {
    /// User-turn count at the last firing; 0 until the first one.
    pub last_trigger_turn: usize,
}

/// Process-lifetime cooldown counters, one per persona.
#[derive(Debug, Default)]
pub struct SkillStateStore {
    slots: DashMap<PersonaId, SkillState>,
}

impl SkillStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, persona: PersonaId) -> SkillState {
        self.slots.get(&persona).map(|s| *s).unwrap_or_default()
    }

    /// Run `f` with exclusive access to `persona`'s state.
    ///
    /// `f` must not touch the store itself.
    pub fn with_state<T>(&self, persona: PersonaId, f: impl FnOnce(&mut SkillState) -> T) -> T {
        let mut slot = self.slots.entry(persona).or_default();
        f(slot.value_mut())
    }
}

/// Decides whether a persona's skill fires on this turn.
#[derive(Debug, Clone)]
pub struct SkillTriggerEngine {
    store: Arc<SkillStateStore>,
}

impl SkillTriggerEngine {
    pub fn new(store: Arc<SkillStateStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SkillStateStore> {
        &self.store
    }

    /// Check the persona's skill against `turns`, recording a firing.
    ///
    /// Returns `None` for unknown personas, while cooling down, or when a
    /// probabilistic gate declines.
    pub fn check_skill<R: Rng + ?Sized>(
        &self,
        persona: PersonaId,
        turns: &[Turn],
        rng: &mut R,
    ) -> Option<SkillDirective> {
        let profile = persona.profile()?;
        let user_turns: Vec<&str> = turns
            .iter()
            .filter(|t| t.is_user())
            .map(|t| t.content.as_str())
            .collect();
        let n = user_turns.len();

        self.store.with_state(persona, |state| {
            if n.saturating_sub(state.last_trigger_turn) < profile.skill.cooldown {
                return None;
            }
            let fired = match profile.skill.variant {
                SkillVariant::EmotionSensing => Some(sense_emotion(&user_turns)),
                SkillVariant::SuggestionInjection => inject_suggestion(rng),
                SkillVariant::ContradictionDetection => detect_contradiction(&user_turns, rng),
            };
            let (trigger, text) = fired?;
            debug!(
                persona = %persona,
                skill = profile.skill.name,
                user_turns = n,
                previous = state.last_trigger_turn,
                "skill fired"
            );
            state.last_trigger_turn = n;
            Some(SkillDirective {
                skill: profile.skill.name,
                trigger,
                text,
            })
        })
    }
}

fn sense_emotion(user_turns: &[&str]) -> (SkillTrigger, String) {
    let emotion = user_turns
        .last()
        .map(|t| classify_emotion(t))
        .unwrap_or(Emotion::Neutral);
    (
        SkillTrigger::Emotion { emotion },
        emotion.directive().to_string(),
    )
}

fn inject_suggestion<R: Rng + ?Sized>(rng: &mut R) -> Option<(SkillTrigger, String)> {
    if !rng.gen_bool(SUGGESTION_PROBABILITY) {
        return None;
    }
    let template = SUGGESTION_TEMPLATES[rng.gen_range(0..SUGGESTION_TEMPLATES.len())];
    Some((SkillTrigger::Suggestion, template.to_string()))
}

fn detect_contradiction<R: Rng + ?Sized>(
    user_turns: &[&str],
    rng: &mut R,
) -> Option<(SkillTrigger, String)> {
    let [.., previous, latest] = user_turns else {
        return None;
    };
    if let Some((earlier, later)) = find_contradiction(previous, latest) {
        let text = format!(
            "The user's last two messages don't add up (\"{earlier}\" before, \"{later}\" now). \
             Call it out playfully, like a detective catching a slip, and ask which is true."
        );
        return Some((SkillTrigger::Contradiction, text));
    }
    if !rng.gen_bool(PROBE_PROBABILITY) {
        return None;
    }
    let template = PROBE_TEMPLATES[rng.gen_range(0..PROBE_TEMPLATES.len())];
    Some((SkillTrigger::Probe, template.to_string()))
}

/// Lower-case and fold typographic apostrophes so "don’t" matches "don't".
fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// First opposing pair between two consecutive user turns.
pub fn find_contradiction(previous: &str, latest: &str) -> Option<(&'static str, &'static str)> {
    let previous = normalize(previous);
    let latest = normalize(latest);
    let opposing = OPPOSING_PAIRS.iter().find(|(reject, approve)| {
        contains_term(&previous, reject)
            && contains_term(&latest, approve)
            && !contains_term(&latest, reject)
    });
    let temporal = || {
        TEMPORAL_PAIRS
            .iter()
            .find(|(before, after)| contains_term(&previous, before) && contains_term(&latest, after))
    };
    opposing.or_else(temporal).copied()
}
