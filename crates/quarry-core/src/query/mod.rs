//! Per-request query context.

use serde::{Deserialize, Serialize};

use crate::hashing;

/// Role of one prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// A message from the end user.
    User,
    /// A previous assistant answer.
    Bot,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Bot => "bot",
        }
    }
}

/// One prior conversation turn, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

/// Immutable per-request view of the incoming question.
///
/// One instance per request; derived fields (normalized form, word count,
/// cache key) are computed once at construction and never change.
#[derive(Debug, Clone)]
pub struct QueryContext {
    question: String,
    normalized: String,
    word_count: usize,
    history: Vec<ChatTurn>,
}

impl QueryContext {
    pub fn new(question: impl Into<String>, history: Vec<ChatTurn>) -> Self {
        let question = question.into();
        let normalized = hashing::normalize_query(&question);
        let word_count = normalized.split_whitespace().count();
        Self {
            question,
            normalized,
            word_count,
            history,
        }
    }

    /// The question exactly as the caller sent it.
    #[inline]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The normalized form used for caching and routing.
    #[inline]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    #[inline]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// `true` when the query is short enough to qualify for expansion.
    #[inline]
    pub fn is_short(&self, short_query_words: usize) -> bool {
        self.word_count < short_query_words
    }

    /// Cache key covering the normalized question and the history window.
    pub fn cache_key(&self) -> [u8; 32] {
        hashing::cache_key(&self.normalized, hashing::history_fingerprint(&self.history))
    }
}
