//! Hybrid retrieval pipeline.
//!
//! Dense and lexical candidate generation run concurrently, their rankings
//! are fused, boosted by source tier, deduplicated, reranked, and
//! confidence-filtered. Every stage past candidate generation is a pure
//! transform over the candidate list.

pub mod candidate;
pub mod error;
pub mod fusion;
pub mod threshold;
pub mod tiering;


pub use candidate::RankedCandidate;
pub use error::RetrievalError;

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::RetrievalConfig;
use crate::corpus::{Passage, PassageStore};
use crate::embedding::Embedder;
use crate::expansion::QueryExpander;
use crate::index::{DenseIndex, IndexError, LexicalIndex, SearchHit};
use crate::query::QueryContext;
use crate::rerank::Reranker;

/// Aggregate observability counters for one retrieval run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalMetrics {
    pub candidate_count: usize,
    pub avg_similarity: f32,
    pub dense_latency_ms: u64,
    pub lexical_latency_ms: u64,
    pub rerank_latency_ms: u64,
    pub total_latency_ms: u64,
    pub dense_failed: bool,
    pub lexical_failed: bool,
    pub expansion_used: bool,
    pub rerank_applied: bool,
    pub rerank_bypassed: bool,
    pub rerank_failed: bool,
}

/// Final, deduplicated, confidence-filtered evidence for a query.
#[derive(Debug, Default)]
pub struct RetrievalResult {
    /// Surviving candidates, descending by final score, length <= top-k.
    pub candidates: Vec<RankedCandidate>,
    pub metrics: RetrievalMetrics,
}

impl RetrievalResult {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The surfaced passages in rank order.
    pub fn passages(&self) -> Vec<Arc<Passage>> {
        self.candidates
            .iter()
            .map(|c| Arc::clone(&c.passage))
            .collect()
    }
}

enum DenseBranchOutcome {
    Hits { hits: Vec<SearchHit>, expanded: bool },
    IndexFailed,
}

/// Orchestrates dense + lexical retrieval, fusion, tiering, dedup,
/// reranking, and thresholding.
pub struct HybridRetriever {
    dense: Arc<DenseIndex>,
    lexical: Arc<LexicalIndex>,
    passages: Arc<PassageStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    expander: Arc<QueryExpander>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(
        dense: Arc<DenseIndex>,
        lexical: Arc<LexicalIndex>,
        passages: Arc<PassageStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        expander: Arc<QueryExpander>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            dense,
            lexical,
            passages,
            embedder,
            reranker,
            expander,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Runs the full pipeline for one query.
    ///
    /// A single failing source degrades to single-source ranking; an
    /// embedding failure or both sources failing aborts the request.
    #[instrument(skip(self, ctx), fields(query_len = ctx.question().len()))]
    pub async fn retrieve(&self, ctx: &QueryContext) -> Result<RetrievalResult, RetrievalError> {
        let started = Instant::now();
        let mut metrics = RetrievalMetrics::default();

        // Candidate generation: neither branch waits on the other. The
        // expander suspends only the dense branch.
        let dense_fut = async {
            let branch_started = Instant::now();
            (self.dense_branch(ctx).await, branch_started.elapsed())
        };
        let lexical_fut = async {
            let branch_started = Instant::now();
            (self.lexical_branch(ctx).await, branch_started.elapsed())
        };
        let ((dense_outcome, dense_elapsed), (lexical_outcome, lexical_elapsed)) =
            tokio::join!(dense_fut, lexical_fut);
        metrics.dense_latency_ms = dense_elapsed.as_millis() as u64;
        metrics.lexical_latency_ms = lexical_elapsed.as_millis() as u64;

        let dense_hits = match dense_outcome? {
            DenseBranchOutcome::Hits { hits, expanded } => {
                metrics.expansion_used = expanded;
                hits
            }
            DenseBranchOutcome::IndexFailed => {
                metrics.dense_failed = true;
                Vec::new()
            }
        };

        let lexical_hits = match lexical_outcome {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Lexical retrieval failed, degrading to dense-only");
                metrics.lexical_failed = true;
                Vec::new()
            }
        };

        if metrics.dense_failed && metrics.lexical_failed {
            return Err(RetrievalError::AllSourcesFailed);
        }

        // Fusion, tiering, dedup: pure transforms over the candidate list.
        let mut candidates = fusion::fuse(
            &dense_hits,
            &lexical_hits,
            &self.passages,
            self.config.rrf_k,
        );
        tiering::apply_tiering(
            &mut candidates,
            &self.config.authoritative_prefixes,
            self.config.authority_boost,
        );
        let mut candidates = tiering::dedup_by_chunk(candidates);
        candidates.truncate(self.config.candidate_pool);

        if candidates.is_empty() {
            metrics.total_latency_ms = started.elapsed().as_millis() as u64;
            debug!("No candidates after fusion");
            return Ok(RetrievalResult {
                candidates,
                metrics,
            });
        }

        // Rerank, unless the top candidate is already a confident match.
        let top_similarity = candidates
            .first()
            .and_then(|c| c.dense_similarity)
            .unwrap_or(0.0);

        let survivors = if top_similarity > self.config.rerank_bypass_gate {
            metrics.rerank_bypassed = true;
            debug!(top_similarity, "High-confidence match, bypassing rerank");
            threshold::apply_static_floor(
                candidates,
                self.config.score_floor,
                self.config.fusion_keep_floor,
            )
        } else if candidates.len() > 1 {
            let rerank_started = Instant::now();
            match self.rerank_head(ctx.question(), candidates).await {
                Ok(reranked) => {
                    metrics.rerank_applied = true;
                    metrics.rerank_latency_ms = rerank_started.elapsed().as_millis() as u64;
                    threshold::apply_dynamic_threshold(
                        reranked,
                        self.config.score_floor,
                        self.config.fusion_keep_floor,
                    )
                }
                Err((candidates, e)) => {
                    warn!(error = %e, "Reranker unavailable, using fused/tiered order");
                    metrics.rerank_failed = true;
                    metrics.rerank_latency_ms = rerank_started.elapsed().as_millis() as u64;
                    threshold::apply_static_floor(
                        candidates,
                        self.config.score_floor,
                        self.config.fusion_keep_floor,
                    )
                }
            }
        } else {
            threshold::apply_static_floor(
                candidates,
                self.config.score_floor,
                self.config.fusion_keep_floor,
            )
        };

        let final_candidates = self.cap_context(survivors);

        metrics.candidate_count = final_candidates.len();
        metrics.avg_similarity = if final_candidates.is_empty() {
            0.0
        } else {
            final_candidates
                .iter()
                .map(|c| c.dense_similarity.unwrap_or(0.0))
                .sum::<f32>()
                / final_candidates.len() as f32
        };
        metrics.total_latency_ms = started.elapsed().as_millis() as u64;

        info!(
            candidates = metrics.candidate_count,
            avg_similarity = metrics.avg_similarity,
            expansion_used = metrics.expansion_used,
            rerank_applied = metrics.rerank_applied,
            "Retrieval complete"
        );

        Ok(RetrievalResult {
            candidates: final_candidates,
            metrics,
        })
    }

    /// Expansion-gated embedding plus dense index search.
    async fn dense_branch(
        &self,
        ctx: &QueryContext,
    ) -> Result<DenseBranchOutcome, RetrievalError> {
        let expansion = self.expander.expand(ctx).await;
        let expanded = expansion.is_some();
        let embed_text = expansion.as_deref().unwrap_or(ctx.normalized());

        // An embedding failure aborts the request; a dense index failure
        // only degrades to the lexical source.
        let embedding = self.embedder.embed(embed_text).await?;

        match self.dense.search(&embedding, self.config.candidate_pool) {
            Ok(hits) => Ok(DenseBranchOutcome::Hits { hits, expanded }),
            Err(e) => {
                warn!(error = %e, "Dense index search failed, degrading to lexical-only");
                Ok(DenseBranchOutcome::IndexFailed)
            }
        }
    }

    /// Lexical search on the blocking pool (tantivy is CPU-bound).
    async fn lexical_branch(&self, ctx: &QueryContext) -> Result<Vec<SearchHit>, IndexError> {
        let lexical = Arc::clone(&self.lexical);
        let query = ctx.question().to_string();
        let top_n = self.config.candidate_pool;

        match tokio::task::spawn_blocking(move || lexical.search(&query, top_n)).await {
            Ok(result) => result,
            Err(join_err) => Err(IndexError::Lexical(tantivy::TantivyError::SystemError(
                format!("lexical search task failed: {join_err}"),
            ))),
        }
    }

    /// Scores the top `rerank_depth` candidates and reorders that head by
    /// rerank score; the tail keeps its tiered order behind it.
    ///
    /// On any scoring error the untouched candidate list is handed back so
    /// the caller can fall through to the fused/tiered ordering.
    async fn rerank_head(
        &self,
        query: &str,
        candidates: Vec<RankedCandidate>,
    ) -> Result<Vec<RankedCandidate>, (Vec<RankedCandidate>, crate::rerank::RerankError)> {
        let depth = self.config.rerank_depth.min(candidates.len());

        let scores = try_join_all(
            candidates[..depth]
                .iter()
                .map(|c| self.reranker.score(query, &c.passage.text)),
        )
        .await;

        match scores {
            Ok(scores) => {
                let mut candidates = candidates;
                for (candidate, score) in candidates.iter_mut().zip(scores) {
                    candidate.rerank_score = Some(score);
                }
                // Stable sort of the head; ties keep the tiered order.
                candidates[..depth].sort_by(|a, b| {
                    b.rerank_score
                        .partial_cmp(&a.rerank_score)
                        .unwrap_or(Ordering::Equal)
                });
                Ok(candidates)
            }
            Err(e) => Err((candidates, e)),
        }
    }

    /// Caps at top-k, then applies the greedy context character budget.
    fn cap_context(&self, survivors: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
        let mut total_chars = 0usize;
        let mut capped = Vec::with_capacity(self.config.top_k.min(survivors.len()));
        for candidate in survivors.into_iter().take(self.config.top_k) {
            let len = candidate.passage.text.len();
            if total_chars + len > self.config.max_context_chars {
                break;
            }
            total_chars += len;
            capped.push(candidate);
        }
        capped
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("passages", &self.passages.len())
            .field("config", &self.config)
            .finish()
    }
}
