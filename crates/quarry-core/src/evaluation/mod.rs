//! Output guardrails.
//!
//! A local, synchronous, side-effect-free inspection of the generated
//! answer against the retrieved evidence. Flags are advisory: they ride
//! along in response metadata and never block delivery.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::retrieval::RankedCandidate;

/// A single guardrail violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// The evidence set was empty after thresholding.
    NoContext,
    /// The answer matches refusal phrasing.
    HiddenRefusal,
    /// The answer's key terms barely overlap the retrieved evidence.
    UnverifiedClaim,
    /// The answer echoes internal instructions or policies.
    SystemLeakage,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::NoContext => "no_context",
            Flag::HiddenRefusal => "hidden_refusal",
            Flag::UnverifiedClaim => "unverified_claim",
            Flag::SystemLeakage => "system_leakage",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Functional English words plus navigation filler; filtered out before
/// keyword comparison.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "was", "were", "be", "been", "being",
    "have", "has", "had", "do", "does", "did", "will", "would", "could", "should", "may",
    "might", "must", "can", "shall", "to", "of", "in", "on", "at", "for", "from", "with", "by",
    "about", "as", "into", "through", "during", "before", "after", "above", "below", "between",
    "under", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we", "they",
    "me", "him", "her", "us", "them", "my", "your", "his", "its", "our", "their", "what",
    "which", "who", "whom", "when", "where", "why", "how", "all", "each", "every", "both",
    "few", "more", "most", "other", "some", "such", "no", "not", "only", "same", "than", "too",
    "very", "just", "own", "so", "if", "then", "also", "up", "out", "any", "here", "there",
    "now", "get", "use", "used", "using", "like", "well", "new", "user", "click", "go", "see",
    "make", "note", "please", "refer",
];

const REFUSAL_PHRASES: &[&str] = &[
    "i don't know",
    "i do not know",
    "i could not find",
    "i am sorry",
    "i'm sorry",
    "not mentioned in the provided",
    "cannot answer",
    "does not contain information",
    "no information available",
];

const MIN_KEYWORD_LEN: usize = 4;
const KEYWORD_TOP_N: usize = 15;

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

fn leakage_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)system\s*prompt",
            r"(?i)hidden\s*polic",
            r"(?i)ignore\s*previous",
            r"(?i)developer\s*mode",
            r"(?i)internal\s*reasoning",
            r"(?i)untrusted\s*data",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static leakage pattern compiles"))
        .collect()
    })
}

fn redaction_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)system\s*prompt",
            r"(?i)hidden\s*polic\w*",
            r"(?i)untrusted\s*data",
            r"(?i)ignore\s*previous",
            r"(?i)\[START\s*OF\s*SEARCH",
            r"(?i)documentation\s*chunk",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static redaction pattern compiles"))
        .collect()
    })
}

/// Extracts the most frequent meaningful terms from free text.
///
/// Punctuation is stripped, terms shorter than four characters and
/// stopwords are dropped, and the top terms by frequency are returned
/// (frequency descending, then lexicographic, so the cut is stable).
pub fn extract_keywords(text: &str, top_n: usize) -> HashSet<String> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
    {
        let token = token.trim_matches('\'');
        if token.len() < MIN_KEYWORD_LEN || stopwords().contains(token) {
            continue;
        }
        *freq.entry(token.to_string()).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, usize)> = freq.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.into_iter().take(top_n).map(|(w, _)| w).collect()
}

/// Evaluates a generated answer against the query and its evidence.
///
/// `evidence_similarity_floor` gates which passages count as valid
/// grounding; `min_overlap_ratio` is the keyword-overlap ratio below which
/// the answer is flagged as unverified.
pub fn evaluate_answer(
    answer: &str,
    evidence: &[RankedCandidate],
    evidence_similarity_floor: f32,
    min_overlap_ratio: f32,
) -> Vec<Flag> {
    let mut flags = Vec::new();
    let answer_lower = answer.to_lowercase();

    if evidence.is_empty() {
        flags.push(Flag::NoContext);
    }

    let refused = REFUSAL_PHRASES.iter().any(|p| answer_lower.contains(p));
    if refused {
        flags.push(Flag::HiddenRefusal);
    }

    // Grounding check: skipped for refusals and empty evidence, where low
    // overlap is expected.
    if !refused && !evidence.is_empty() {
        let valid_context: Vec<&RankedCandidate> = evidence
            .iter()
            .filter(|c| c.dense_similarity.unwrap_or(0.0) > evidence_similarity_floor)
            .collect();

        if valid_context.is_empty() {
            flags.push(Flag::UnverifiedClaim);
        } else {
            let mut context_keywords: HashSet<String> = HashSet::new();
            for candidate in valid_context {
                context_keywords.extend(extract_keywords(&candidate.passage.text, KEYWORD_TOP_N));
            }
            let answer_keywords = extract_keywords(answer, KEYWORD_TOP_N);
            if !answer_keywords.is_empty() {
                let overlap = answer_keywords.intersection(&context_keywords).count();
                let ratio = overlap as f32 / answer_keywords.len() as f32;
                if ratio < min_overlap_ratio {
                    flags.push(Flag::UnverifiedClaim);
                }
            }
        }
    }

    if leakage_patterns().iter().any(|p| p.is_match(answer)) {
        flags.push(Flag::SystemLeakage);
    }

    flags
}

/// Redacts internal-token patterns from the final answer.
pub fn sanitize_answer(answer: &str) -> String {
    let mut sanitized = answer.to_string();
    for pattern in redaction_patterns() {
        sanitized = pattern.replace_all(&sanitized, "[REDACTED]").into_owned();
    }
    sanitized
}
