//! Cached response snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::evaluation::Flag;
use crate::routing::Tier;

/// One surfaced evidence reference, as shown to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceRef {
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub relevance_score: f32,
}

/// Immutable snapshot of a completed answer, stored in the response cache.
///
/// Per-request latency is deliberately absent: a cache hit reports its own
/// (sub-millisecond) latency, not the original pipeline's.
#[derive(Debug, Clone, Serialize)]
pub struct CachedAnswer {
    pub answer: String,
    pub sources: Vec<EvidenceRef>,
    pub model_used: String,
    pub tier: Tier,
    pub routing_score: u32,
    pub tokens_input: u32,
    pub tokens_output: u32,
    pub retrieval_latency_ms: u64,
    pub candidate_count: usize,
    pub avg_similarity: f32,
    pub evaluator_flags: Vec<Flag>,
    pub created_at: DateTime<Utc>,
}
