//! Caller-facing request/response contract.

use serde::{Deserialize, Serialize};

use quarry::{CachedAnswer, ChatTurn, EvidenceRef, Flag, Tier};

/// Incoming question plus optional bounded conversation history.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenUsage {
    pub input: u32,
    pub output: u32,
}

/// Structured per-request metadata block.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseMetadata {
    pub model_used: String,
    pub tier: Tier,
    pub routing_score: u32,
    pub tokens: TokenUsage,
    pub latency_ms: u64,
    pub retrieval_latency_ms: u64,
    pub candidate_count: usize,
    pub avg_similarity: f32,
    pub evaluator_flags: Vec<Flag>,
    pub cache_hit: bool,
}

/// Full non-streaming response body.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub metadata: ResponseMetadata,
    pub sources: Vec<EvidenceRef>,
    pub conversation_id: String,
}

impl QueryResponse {
    /// Materializes a response from a cached or freshly computed answer.
    pub fn from_answer(
        answer: &CachedAnswer,
        conversation_id: String,
        latency_ms: u64,
        cache_hit: bool,
    ) -> Self {
        Self {
            answer: answer.answer.clone(),
            metadata: ResponseMetadata {
                model_used: answer.model_used.clone(),
                tier: answer.tier,
                routing_score: answer.routing_score,
                tokens: TokenUsage {
                    input: answer.tokens_input,
                    output: answer.tokens_output,
                },
                latency_ms,
                retrieval_latency_ms: answer.retrieval_latency_ms,
                candidate_count: answer.candidate_count,
                avg_similarity: answer.avg_similarity,
                evaluator_flags: answer.evaluator_flags.clone(),
                cache_hit,
            },
            sources: answer.sources.clone(),
            conversation_id,
        }
    }
}

/// Generates a fresh conversation id when the caller did not supply one.
pub fn conversation_id_or_new(requested: Option<String>) -> String {
    requested.unwrap_or_else(|| format!("conv_{}", uuid::Uuid::new_v4().simple()))
}
