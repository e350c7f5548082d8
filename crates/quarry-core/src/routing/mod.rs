//! Deterministic query router.
//!
//! Scores the incoming question with additive heuristics and picks a
//! generation tier. Pure and synchronous: no I/O, no model calls, identical
//! normalized input always yields the identical decision.

use serde::Serialize;
use std::collections::HashSet;

use crate::config::RouterConfig;

/// Generation tier selected by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Deep,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Deep => "deep",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Router output: selected tier plus the raw additive score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub tier: Tier,
    pub score: u32,
}

const LENGTH_POINTS: u32 = 1;
const MULTI_QUESTION_POINTS: u32 = 1;
const REASONING_POINTS: u32 = 2;
const TROUBLESHOOTING_POINTS: u32 = 2;
const PROCEDURAL_POINTS: u32 = 2;
const URGENCY_POINTS: u32 = 1;

/// Comparative/causal question forms.
const REASONING_WORDS: &[&str] = &["why", "compare", "evaluate", "difference", "explain", "reason"];

/// Failure vocabulary; single words matched exactly, phrases by substring.
const TROUBLESHOOTING_WORDS: &[&str] = &["fail", "error", "broken", "bug", "issue", "crash"];
const TROUBLESHOOTING_PHRASES: &[&str] = &["doesn't work", "not working"];

const PROCEDURAL_PHRASES: &[&str] = &[
    "how to",
    "steps",
    "process",
    "walk me through",
    "guide",
    "tutorial",
];

const URGENCY_WORDS: &[&str] = &[
    "frustrated",
    "complaint",
    "urgent",
    "asap",
    "angry",
    "terrible",
    "worst",
];

/// Routes a query to a generation tier.
///
/// Each category contributes its fixed points at most once, however many of
/// its keywords match. The empty query scores 0 and routes fast.
pub fn route_query(query: &str, config: &RouterConfig) -> RouteDecision {
    let lower = query.to_lowercase();
    let words: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();

    let mut score = 0;

    if lower.split_whitespace().count() > config.length_word_threshold {
        score += LENGTH_POINTS;
    }

    if query.matches('?').count() > 1 {
        score += MULTI_QUESTION_POINTS;
    }

    if REASONING_WORDS.iter().any(|w| words.contains(w)) {
        score += REASONING_POINTS;
    }

    if TROUBLESHOOTING_WORDS.iter().any(|w| words.contains(w))
        || TROUBLESHOOTING_PHRASES.iter().any(|p| lower.contains(p))
    {
        score += TROUBLESHOOTING_POINTS;
    }

    if PROCEDURAL_PHRASES.iter().any(|p| lower.contains(p)) {
        score += PROCEDURAL_POINTS;
    }

    if URGENCY_WORDS.iter().any(|w| words.contains(w)) {
        score += URGENCY_POINTS;
    }

    let tier = if score >= config.deep_threshold {
        Tier::Deep
    } else {
        Tier::Fast
    };

    RouteDecision { tier, score }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(query: &str) -> RouteDecision {
        route_query(query, &RouterConfig::default())
    }

    #[test]
    fn empty_query_routes_fast_with_zero_score() {
        let decision = route("");
        assert_eq!(decision.score, 0);
        assert_eq!(decision.tier, Tier::Fast);
    }

    #[test]
    fn identical_text_yields_identical_decision() {
        let q = "Why does the OAuth integration fail after the upgrade?";
        for _ in 0..3 {
            assert_eq!(route(q), route(q));
        }
    }

    #[test]
    fn long_query_without_keywords_scores_exactly_length_points() {
        // 16 neutral words, no category vocabulary.
        let q = "the team reviewed the seasonal report during the afternoon meeting \
                 and shared several planning updates";
        assert_eq!(q.split_whitespace().count(), 16);
        let decision = route(q);
        assert_eq!(decision.score, LENGTH_POINTS);
        assert_eq!(decision.tier, Tier::Fast);
    }

    #[test]
    fn repeated_keywords_count_their_category_once() {
        let single = route("why is this");
        let repeated = route("why why why explain");
        assert_eq!(single.score, REASONING_POINTS);
        assert_eq!(repeated.score, REASONING_POINTS);
    }

    #[test]
    fn categories_sum() {
        // reasoning (2) + troubleshooting (2) + urgency (1)
        let decision = route("urgent: explain why the webhook is broken");
        assert_eq!(decision.score, 5);
        assert_eq!(decision.tier, Tier::Deep);
    }

    #[test]
    fn multiple_question_marks_add_a_point() {
        let decision = route("is it A? or is it B?");
        assert_eq!(decision.score, MULTI_QUESTION_POINTS);
    }

    #[test]
    fn keyword_matching_respects_word_boundaries() {
        // "failure" must not match the "fail" keyword; "failed" neither.
        let decision = route("the failed attempts");
        assert_eq!(decision.score, 0);
    }

    #[test]
    fn procedural_phrases_route_deep() {
        let decision = route("how to rotate api keys");
        assert_eq!(decision.score, PROCEDURAL_POINTS);
        assert_eq!(decision.tier, Tier::Deep);
    }

    #[test]
    fn simple_lookup_routes_fast() {
        let decision = route("pricing for the enterprise plan");
        assert_eq!(decision.tier, Tier::Fast);
    }
}
