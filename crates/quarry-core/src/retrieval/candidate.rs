//! Per-query candidate records.

use std::sync::Arc;

use crate::corpus::Passage;

/// One candidate passage moving through the retrieval pipeline.
///
/// Created at dense/lexical retrieval, mutated by fusion, tiering, and
/// reranking, and dropped after response assembly; never persisted.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    /// The originating passage.
    pub passage: Arc<Passage>,
    /// 1-indexed rank in the dense result list, if present there.
    pub dense_rank: Option<usize>,
    /// Dense cosine similarity, if present in the dense list.
    pub dense_similarity: Option<f32>,
    /// 1-indexed rank in the lexical result list, if present there.
    pub lexical_rank: Option<usize>,
    /// Native lexical (BM25) score, if present in the lexical list.
    pub lexical_score: Option<f32>,
    /// Reciprocal-rank-fusion score.
    pub fused_score: f32,
    /// Fused score after source-tier boosting.
    pub tiered_score: f32,
    /// Cross-encoder score, set only for the reranked head.
    pub rerank_score: Option<f32>,
}

impl RankedCandidate {
    pub fn from_passage(passage: Arc<Passage>) -> Self {
        Self {
            passage,
            dense_rank: None,
            dense_similarity: None,
            lexical_rank: None,
            lexical_score: None,
            fused_score: 0.0,
            tiered_score: 0.0,
            rerank_score: None,
        }
    }

    #[inline]
    pub fn chunk_id(&self) -> &str {
        &self.passage.chunk_id
    }

    #[inline]
    pub fn doc_id(&self) -> &str {
        &self.passage.doc_id
    }

    /// Best (lowest) rank across the source lists; used for tie-breaking.
    pub fn best_rank(&self) -> usize {
        match (self.dense_rank, self.lexical_rank) {
            (Some(d), Some(l)) => d.min(l),
            (Some(d), None) => d,
            (None, Some(l)) => l,
            (None, None) => usize::MAX,
        }
    }

    /// The score the final ordering is based on: rerank when available,
    /// tiered otherwise.
    #[inline]
    pub fn final_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.tiered_score)
    }
}
