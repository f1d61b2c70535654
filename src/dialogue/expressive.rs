//! Expressive speech text.
//!
//! Rewrites a reply so it *sounds* like the persona once synthesized: halting
//! stutters for the nervous, hammered emphasis for the authoritative. Only
//! ever applied to text headed for TTS, never to the chat transcript.
//!
//! ```text
//! text ─► split_sentences ─► per sentence: maybe stutter (base pass)
//!                                  │
//!                                  └─► persona emphasis pass (optional)
//!                                        a) "!" after emphasis words
//!                                        b) strengthen sentence terminals
//!                                        c) maybe insert an interjection
//!                                        d) "…" after strong terminals
//! ```
//!
//! All randomness comes from the caller's [`Rng`], so a seeded generator
//! reproduces the exact output. Every step is infallible: when nothing can be
//! mutated the text passes through unchanged.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::persona::{ExpressiveProfile, PersonaId};

/// Marks that end a sentence.
pub const TERMINALS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Pause glyph used inside stutters and after strong terminals.
pub const PAUSE: char = '…';

/// Occurrences of the stuttered character, inclusive.
const MIN_REPEATS: usize = 2;
const MAX_REPEATS: usize = 4;

/// Chance that a gap inside a stutter is a pause rather than a plain break.
const PAUSE_PROBABILITY: f64 = 0.3;

const INTERJECTION_PROBABILITY: f64 = 0.35;
const INTERJECTIONS: [&str; 3] = ["Hmph!", "Listen!", "Mark me!"];

static EMPHASIS_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:must|now|never|always|immediately|everyone)\b|必须|立刻|绝不|马上").unwrap()
});

fn is_terminal(c: char) -> bool {
    TERMINALS.contains(&c)
}

fn is_strong_terminal(c: char) -> bool {
    matches!(c, '!' | '?' | '！' | '？')
}

fn is_punctuation(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

/// Split into sentences. Each piece keeps its run of terminal marks and the
/// whitespace after it, so concatenating the pieces gives back `text`. A
/// trailing fragment without a terminal is its own sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        while chars.next_if(|&(_, next)| is_terminal(next)).is_some() {}
        while chars.next_if(|&(_, next)| next.is_whitespace()).is_some() {}
        let end = chars.peek().map_or(text.len(), |&(i, _)| i);
        sentences.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Positions that may be stuttered: an alphanumeric character with no
/// punctuation on either side and a non-space character after it, never
/// adjacent to the previous candidate.
fn candidate_positions(chars: &[char]) -> Vec<usize> {
    let mut candidates: Vec<usize> = Vec::new();
    for (i, pair) in chars.windows(2).enumerate() {
        let (current, next) = (pair[0], pair[1]);
        if !current.is_alphanumeric() || is_punctuation(next) || next.is_whitespace() {
            continue;
        }
        if i > 0 && is_punctuation(chars[i - 1]) {
            continue;
        }
        if candidates.last().is_some_and(|&prev| prev + 1 == i) {
            continue;
        }
        candidates.push(i);
    }
    candidates
}

fn stutter_token<R: Rng + ?Sized>(c: char, rng: &mut R) -> String {
    let repeats = rng.gen_range(MIN_REPEATS..=MAX_REPEATS);
    let plain_break = if c.is_ascii_alphabetic() { "-" } else { "" };
    let mut token = String::new();
    for k in 0..repeats {
        if k > 0 {
            if rng.gen_bool(PAUSE_PROBABILITY) {
                for _ in 0..rng.gen_range(1..=2) {
                    token.push(PAUSE);
                }
            } else {
                token.push_str(plain_break);
            }
        }
        token.push(c);
    }
    token
}

/// Replace one randomly chosen candidate character with a stutter token.
fn stutter_sentence<R: Rng + ?Sized>(sentence: &str, rng: &mut R) -> String {
    let chars: Vec<char> = sentence.chars().collect();
    let candidates = candidate_positions(&chars);
    if candidates.is_empty() {
        return sentence.to_string();
    }
    let pos = candidates[rng.gen_range(0..candidates.len())];

    let mut out: String = chars[..pos].iter().collect();
    out.push_str(&stutter_token(chars[pos], rng));
    out.extend(&chars[pos + 1..]);
    out
}

/// `!` after every emphasis word that is not already followed by punctuation.
fn intensify_words(sentence: &str) -> String {
    let mut out = String::with_capacity(sentence.len() + 8);
    let mut last = 0;
    for m in EMPHASIS_WORDS.find_iter(sentence) {
        out.push_str(&sentence[last..m.end()]);
        if !sentence[m.end()..].chars().next().is_some_and(is_punctuation) {
            out.push('!');
        }
        last = m.end();
    }
    out.push_str(&sentence[last..]);
    out
}

/// Soft terminal run → strong mark; strong run → one mark stronger.
fn strengthen_terminal(sentence: &str) -> String {
    let body = sentence.trim_end();
    let trailing = &sentence[body.len()..];
    let Some(run_start) = body
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_terminal(c))
        .last()
        .map(|(i, _)| i)
    else {
        return sentence.to_string();
    };

    let (head, run) = body.split_at(run_start);
    let strengthened = match run.chars().last() {
        Some('.') => "!".to_string(),
        Some('。') => "！".to_string(),
        Some('!' | '?') => format!("{run}!"),
        Some('！' | '？') => format!("{run}！"),
        _ => run.to_string(),
    };
    format!("{head}{strengthened}{trailing}")
}

/// A pause after every strong terminal run not already followed by one.
fn add_pauses(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        let next = chars.get(i + 1).copied();
        if is_strong_terminal(c) && !next.is_some_and(is_terminal) && next != Some(PAUSE) {
            out.push(PAUSE);
        }
    }
    out
}

/// Authoritative delivery: emphasis marks, stronger terminals, an occasional
/// interjection near the start, and pauses after strong terminals.
fn emphasize<R: Rng + ?Sized>(sentences: Vec<String>, rng: &mut R) -> String {
    let mut sentences: Vec<String> = sentences
        .iter()
        .map(|s| strengthen_terminal(&intensify_words(s)))
        .collect();

    if sentences.len() >= 2 && rng.gen_bool(INTERJECTION_PROBABILITY) {
        let upper = (sentences.len() / 3).clamp(1, sentences.len() - 1);
        let at = rng.gen_range(1..=upper);
        let word = INTERJECTIONS[rng.gen_range(0..INTERJECTIONS.len())];
        let gap = if sentences[at - 1].ends_with(char::is_whitespace) {
            " "
        } else {
            ""
        };
        sentences.insert(at, format!("{word}{gap}"));
    }

    add_pauses(&sentences.concat())
}

/// Apply an explicit expressive profile.
pub fn speak_with<R: Rng + ?Sized>(text: &str, profile: &ExpressiveProfile, rng: &mut R) -> String {
    let probability = profile.stutter_probability;
    let probability = if (0.0..=1.0).contains(&probability) {
        probability
    } else {
        0.0
    };

    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .map(|sentence| {
            if rng.gen_bool(probability) {
                stutter_sentence(sentence, rng)
            } else {
                sentence.to_string()
            }
        })
        .collect();

    if profile.emphasis {
        emphasize(sentences, rng)
    } else {
        sentences.concat()
    }
}

/// Turn a reply into the persona's spoken form. Unknown personas speak the
/// text unchanged.
pub fn speak<R: Rng + ?Sized>(text: &str, persona: PersonaId, rng: &mut R) -> String {
    match persona.profile() {
        Some(profile) => speak_with(text, &profile.expressive, rng),
        None => text.to_string(),
    }
}
