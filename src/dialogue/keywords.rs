//! Salient-phrase extraction from recent turns.
//!
//! A keyword is the short span that follows a cue phrase ("I love …",
//! "I live in …", "remember when …", "my sister …"). The compactor uses these
//! as a cheap proxy for what the user is currently talking about.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::Turn;

/// Family a cue phrase belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    Preference,
    Location,
    Temporal,
    Person,
}

/// Optional English filler between a cue and its span ("my friend named X").
const FILLER: &str = r"(?:(?:named|called|the|a|an|to|in|at|is|was)\s+)?";

/// One token: no whitespace, no clause punctuation (ASCII or full-width).
const SPAN: &str = r"([^\s.,!?;:。！？，；：、]{1,16})";

static CUE_PATTERNS: Lazy<Vec<(CueKind, Regex)>> = Lazy::new(|| {
    let cues = [
        (
            CueKind::Preference,
            r"\bi (?:really )?(?:like|love|enjoy|prefer|adore|hate)\b|\bmy favou?rite(?: [a-z]+)? is|我(?:很|最|特别)?(?:喜欢|爱|讨厌)",
        ),
        (
            CueKind::Location,
            r"\bi live in|\bi'?m from|\bi am from|\bi went to|\bi visited|\bwe met at|我住在|我来自|我去了",
        ),
        (
            CueKind::Temporal,
            r"\bremember when|\bback when|\bever since|\blast (?:week|month|year|night)|\bnext (?:week|month|year)|上次|那天|昨天|明天",
        ),
        (
            CueKind::Person,
            r"\bmy (?:friend|brother|sister|mother|mom|father|dad|wife|husband|partner|boss)|\bsomeone (?:named|called)|我的(?:朋友|哥哥|姐姐|妹妹|弟弟|妈妈|爸爸|老板)",
        ),
    ];
    cues.iter()
        .map(|(kind, cue)| {
            let pattern = format!(r"(?i)(?:{cue})\s*{FILLER}{SPAN}");
            // Patterns are compile-time constants; a failure here is a typo.
            (*kind, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Extract keywords from free text.
///
/// Keywords are trimmed, lower-cased and kept only when longer than one
/// character. Order is not significant.
pub fn extract_keywords(text: &str) -> HashSet<String> {
    extract_keywords_by_kind(text)
        .into_iter()
        .map(|(_, keyword)| keyword)
        .collect()
}

/// Like [`extract_keywords`] but reports which cue family produced each hit.
pub fn extract_keywords_by_kind(text: &str) -> Vec<(CueKind, String)> {
    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    for (kind, pattern) in CUE_PATTERNS.iter() {
        for caps in pattern.captures_iter(text) {
            let Some(span) = caps.get(1) else { continue };
            let keyword = span.as_str().trim().to_lowercase();
            if keyword.chars().count() > 1 && seen.insert(keyword.clone()) {
                hits.push((*kind, keyword));
            }
        }
    }
    hits
}

/// Keywords from the concatenated content of the last `window` turns.
pub fn recent_keywords(turns: &[Turn], window: usize) -> HashSet<String> {
    let start = turns.len().saturating_sub(window);
    let text = turns[start..]
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    extract_keywords(&text)
}
