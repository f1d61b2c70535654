//! Talent request detection.
//!
//! When the user's latest utterance asks for a persona's talent ("sing for
//! me", "deduce …"), the persona's performance directive is appended to the
//! system prompt. Stateless; applying it twice appends twice, so callers run
//! it once per turn.

use std::borrow::Cow;

use crate::persona::{PersonaId, PersonaProfile};

/// The block appended to the system prompt when a talent is requested.
pub fn directive_block(profile: &PersonaProfile) -> String {
    format!(
        "\n\n[Talent: {}]\n{}",
        profile.talent.name, profile.talent.directive
    )
}

/// First trigger phrase of `persona` contained in `utterance`, if any.
pub fn matched_trigger(persona: PersonaId, utterance: &str) -> Option<&'static str> {
    persona
        .profile()?
        .talent
        .triggers
        .iter()
        .copied()
        .find(|phrase| utterance.contains(phrase))
}

/// Extend `system_prompt` with the talent directive if `last_user_utterance`
/// requests the persona's talent.
///
/// Returns [`Cow::Borrowed`] (the input itself) when nothing matched, so a
/// caller can tell "unchanged" apart without comparing strings.
pub fn detect_talent<'a>(
    persona: PersonaId,
    last_user_utterance: &str,
    system_prompt: &'a str,
) -> Cow<'a, str> {
    let Some(profile) = persona.profile() else {
        return Cow::Borrowed(system_prompt);
    };
    if matched_trigger(persona, last_user_utterance).is_none() {
        return Cow::Borrowed(system_prompt);
    }
    let mut extended = String::with_capacity(system_prompt.len() + 256);
    extended.push_str(system_prompt);
    extended.push_str(&directive_block(profile));
    Cow::Owned(extended)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPT: &str = "You are Lirien.";

    #[test]
    fn test_trigger_appends_block_once() {
        let block = directive_block(PersonaId::Bard.profile().unwrap());
        let out = detect_talent(PersonaId::Bard, "sing for me", PROMPT);

        assert!(matches!(out, Cow::Owned(_)));
        assert_eq!(out.len(), PROMPT.len() + block.len());
        assert_eq!(out.matches(block.as_str()).count(), 1);
        assert!(out.starts_with(PROMPT));
    }

    #[test]
    fn test_no_trigger_returns_input() {
        let out = detect_talent(PersonaId::Bard, "how was the road?", PROMPT);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, PROMPT);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let out = detect_talent(PersonaId::Bard, "SING FOR ME", PROMPT);
        assert_eq!(out, PROMPT);
    }

    #[test]
    fn test_other_personas_triggers_do_not_apply() {
        let out = detect_talent(PersonaId::Detective, "sing a song please", PROMPT);
        assert_eq!(out, PROMPT);
    }

    #[test]
    fn test_unknown_persona_unchanged() {
        let out = detect_talent(PersonaId::Unknown, "sing for me", PROMPT);
        assert_eq!(out, PROMPT);
    }

    #[test]
    fn test_reapplication_duplicates_block() {
        let block = directive_block(PersonaId::Commander.profile().unwrap());
        let once = detect_talent(PersonaId::Commander, "give a speech", PROMPT).into_owned();
        let twice = detect_talent(PersonaId::Commander, "give a speech", &once).into_owned();
        assert_eq!(twice.matches(block.as_str()).count(), 2);
    }

    #[test]
    fn test_chinese_trigger() {
        assert_eq!(matched_trigger(PersonaId::Bard, "给我唱首歌吧"), Some("唱首歌"));
    }
}
