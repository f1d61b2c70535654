//! Bounded-memory history compaction.
//!
//! Keeps prompt size under a token budget by dropping older turns. Turn 0 and
//! the most recent turns always survive; older turns survive only when they
//! mention something the user is talking about right now (see
//! [`super::keywords`]). A hard ceiling caps the result regardless of how many
//! turns look salient.

use std::collections::HashSet;

use tracing::debug;

use super::keywords::recent_keywords;
use crate::types::Turn;

/// Conversations this short are never compacted.
pub const MIN_TURNS_FOR_COMPACTION: usize = 8;

/// Compaction starts once the estimate exceeds this share of the budget.
pub const BUDGET_TRIGGER_RATIO: f64 = 0.8;

/// Rough tokens-per-character multiplier. Not a tokenizer.
pub const TOKENS_PER_CHAR: f64 = 0.6;

/// Most recent turns that are always retained.
pub const TAIL_TURNS: usize = 6;

/// Trailing turns scanned for keywords.
pub const KEYWORD_WINDOW: usize = 3;

/// Upper bound on the assembled history.
pub const MAX_RETAINED: usize = 12;

/// Recent turns kept (after turn 0) when the ceiling is hit.
pub const FALLBACK_TAIL: usize = 10;

/// Approximate token count of a conversation.
///
/// Deterministic and monotonic in content length.
pub fn estimate_tokens(turns: &[Turn]) -> usize {
    turns
        .iter()
        .map(|t| (t.content.chars().count() as f64 * TOKENS_PER_CHAR).ceil() as usize)
        .sum()
}

/// Compacts conversation history against a fixed token budget.
#[derive(Debug, Clone, Copy)]
pub struct HistoryCompactor {
    budget: usize,
}

impl HistoryCompactor {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether [`compact`](Self::compact) would change `turns`.
    pub fn needs_compaction(&self, turns: &[Turn]) -> bool {
        if turns.len() <= MIN_TURNS_FOR_COMPACTION {
            return false;
        }
        estimate_tokens(turns) as f64 > self.budget as f64 * BUDGET_TRIGGER_RATIO
    }

    /// Drop low-salience history.
    ///
    /// Returns the input untouched when no compaction is needed. Otherwise the
    /// result is a subsequence of the input, starts with turn 0 and holds at
    /// most [`MAX_RETAINED`] turns.
    pub fn compact(&self, turns: Vec<Turn>) -> Vec<Turn> {
        if !self.needs_compaction(&turns) {
            return turns;
        }

        let total = turns.len();
        let keep = retained_positions(&turns);
        debug!(
            total,
            retained = keep.len(),
            budget = self.budget,
            "compacted conversation history"
        );

        turns
            .into_iter()
            .enumerate()
            .filter_map(|(i, turn)| keep.contains(&i).then_some(turn))
            .collect()
    }
}

/// Positions to keep, decided by position so identical texts never collapse.
fn retained_positions(turns: &[Turn]) -> HashSet<usize> {
    let mut keep = keyword_positions(turns);
    if keep.len() > MAX_RETAINED {
        let total = turns.len();
        keep.clear();
        keep.insert(0);
        keep.extend(total.saturating_sub(FALLBACK_TAIL).max(1)..total);
    }
    keep
}

/// Turn 0, the tail, and earlier turns sharing a recent keyword.
fn keyword_positions(turns: &[Turn]) -> HashSet<usize> {
    let total = turns.len();
    let tail_start = total.saturating_sub(TAIL_TURNS).max(1);
    let keywords = recent_keywords(turns, KEYWORD_WINDOW);

    let mut keep: HashSet<usize> = HashSet::with_capacity(MAX_RETAINED + 1);
    keep.insert(0);
    if !keywords.is_empty() {
        for (i, turn) in turns.iter().enumerate().take(tail_start).skip(1) {
            let content = turn.content.to_lowercase();
            if keywords.iter().any(|k| content.contains(k.as_str())) {
                keep.insert(i);
            }
        }
    }
    keep.extend(tail_start..total);
    keep
}

/// Convenience wrapper for a one-off compaction.
pub fn compact(turns: Vec<Turn>, budget: usize) -> Vec<Turn> {
    HistoryCompactor::new(budget).compact(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use proptest::prelude::*;

    fn filler(n: usize) -> Vec<Turn> {
        let mut turns = vec![Turn::system("You are a bard.")];
        for i in 1..n {
            if i % 2 == 1 {
                turns.push(Turn::user(format!("user line {i}")));
            } else {
                turns.push(Turn::assistant(format!("bard line {i}")));
            }
        }
        turns
    }

    #[test]
    fn test_short_conversation_untouched() {
        let turns = filler(8);
        assert_eq!(compact(turns.clone(), 0), turns);
    }

    #[test]
    fn test_under_budget_untouched() {
        let turns = filler(30);
        let budget = estimate_tokens(&turns) * 2;
        assert_eq!(compact(turns.clone(), budget), turns);
    }

    #[test]
    fn test_estimate_is_monotonic() {
        let short = vec![Turn::user("abc")];
        let long = vec![Turn::user("abcdef")];
        assert!(estimate_tokens(&short) <= estimate_tokens(&long));
        assert_eq!(estimate_tokens(&[]), 0);
    }

    #[test]
    fn test_keeps_system_tail_and_keyword_turns() {
        let turns = vec![
            Turn::system("You are a bard."),
            Turn::user("I love sailing on calm mornings"),
            Turn::assistant("That sounds peaceful."),
            Turn::user("Work has been busy."),
            Turn::assistant("Rest when you can."),
            Turn::user("Thanks."),
            Turn::assistant("Any plans tonight?"),
            Turn::user("Not really."),
            Turn::user("Honestly I love sailing more than anything"),
            Turn::assistant("Then we should sing of the sea."),
        ];
        let out = compact(turns.clone(), 1);

        assert!(out.len() <= MAX_RETAINED);
        assert_eq!(out[0], turns[0]);
        assert_eq!(out[1], turns[1]);
        assert_eq!(&out[2..], &turns[4..]);
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_ceiling_falls_back_to_recent_turns() {
        let mut turns = vec![Turn::system("sys")];
        for i in 1..20 {
            turns.push(Turn::user(format!("I love tea, round {i}")));
        }
        let out = compact(turns.clone(), 1);

        assert_eq!(out.len(), 1 + FALLBACK_TAIL);
        assert_eq!(out[0], turns[0]);
        assert_eq!(&out[1..], &turns[turns.len() - FALLBACK_TAIL..]);
    }

    #[test]
    fn test_identical_turns_kept_by_position() {
        let mut turns = vec![Turn::system("sys")];
        for _ in 0..12 {
            turns.push(Turn::user("same words"));
        }
        let out = compact(turns, 1);
        assert_eq!(out.len(), 1 + TAIL_TURNS);
        assert!(out[1..].iter().all(|t| t.content == "same words"));
    }

    #[test]
    fn test_keyword_path_is_idempotent() {
        let mut turns = vec![Turn::system("sys")];
        for i in 1..14 {
            let content = if i <= 3 {
                format!("I love lanterns, story {i}")
            } else {
                format!("plain line {i}")
            };
            turns.push(Turn::new(Role::User, content));
        }
        turns.push(Turn::user("I love lanterns still"));

        let compactor = HistoryCompactor::new(1);
        let once = compactor.compact(turns);
        assert_eq!(once.len(), 1 + 3 + TAIL_TURNS);
        let twice = compactor.compact(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fallback_output_fits_budget_and_is_stable() {
        let mut turns = vec![Turn::system("0123456789")];
        for _ in 1..20 {
            turns.push(Turn::user("I love tea"));
        }
        // 20 turns × 6 tokens = 120 > 80; 11 turns × 6 = 66 ≤ 80.
        let compactor = HistoryCompactor::new(100);
        let once = compactor.compact(turns);
        assert_eq!(once.len(), 11);
        assert_eq!(compactor.compact(once.clone()), once);
    }

    fn numbered(contents: &[String]) -> Vec<Turn> {
        let mut turns = vec![Turn::system("#0 system")];
        for (i, c) in contents.iter().enumerate() {
            turns.push(Turn::user(format!("#{} {}", i + 1, c)));
        }
        turns
    }

    fn position(turn: &Turn) -> usize {
        turn.content[1..]
            .split_whitespace()
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap()
    }

    proptest! {
        #[test]
        fn prop_compaction_invariants(
            contents in prop::collection::vec(
                prop::sample::select(vec![
                    "I love tea".to_string(),
                    "I live in Oslo".to_string(),
                    "nothing much".to_string(),
                    "my sister Ana says hi".to_string(),
                    "a much longer line about the weather and the sea".to_string(),
                ]),
                0..30,
            ),
            budget in 0usize..400,
        ) {
            let turns = numbered(&contents);
            let compactor = HistoryCompactor::new(budget);
            let needed = compactor.needs_compaction(&turns);
            let out = compactor.compact(turns.clone());

            prop_assert_eq!(&out[0], &turns[0]);
            if needed {
                prop_assert!(out.len() <= MAX_RETAINED);
            } else {
                prop_assert_eq!(&out, &turns);
            }
            let positions: Vec<usize> = out.iter().map(position).collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

            // The keyword path is always stable; the fallback path only once
            // its output fits the budget.
            let fell_back = needed && keyword_positions(&turns).len() > MAX_RETAINED;
            if !fell_back || !compactor.needs_compaction(&out) {
                prop_assert_eq!(compactor.compact(out.clone()), out);
            }
        }
    }
}
