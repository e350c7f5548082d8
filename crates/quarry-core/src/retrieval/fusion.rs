//! Reciprocal rank fusion.
//!
//! `score(d) = Σ 1/(k + rank_i(d))` over every source list containing `d`,
//! with 1-indexed ranks. k=60 is the standard constant from the original
//! RRF paper; top ranks dominate but deep ranks still contribute.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::candidate::RankedCandidate;
use crate::corpus::PassageStore;
use crate::index::SearchHit;

/// Fuses the dense and lexical rankings into one candidate list.
///
/// The result is sorted by fused score descending; exact ties break by the
/// candidate's best individual rank across both lists, then by first-seen
/// insertion order (dense list first). Hits whose chunk id is missing from
/// the passage store are dropped. Deterministic for identical inputs.
pub fn fuse(
    dense: &[SearchHit],
    lexical: &[SearchHit],
    passages: &PassageStore,
    rrf_k: f32,
) -> Vec<RankedCandidate> {
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    let mut candidates: Vec<RankedCandidate> = Vec::with_capacity(dense.len() + lexical.len());

    for (i, hit) in dense.iter().enumerate() {
        let rank = i + 1;
        let Some(passage) = passages.get(&hit.chunk_id) else {
            warn!(chunk_id = %hit.chunk_id, "Dense hit not in passage store, dropping");
            continue;
        };
        let idx = *by_id.entry(passage.chunk_id.as_str()).or_insert_with(|| {
            candidates.push(RankedCandidate::from_passage(Arc::clone(passage)));
            candidates.len() - 1
        });
        let candidate = &mut candidates[idx];
        candidate.dense_rank = Some(rank);
        candidate.dense_similarity = Some(hit.score);
        candidate.fused_score += 1.0 / (rrf_k + rank as f32);
    }

    for (i, hit) in lexical.iter().enumerate() {
        let rank = i + 1;
        let Some(passage) = passages.get(&hit.chunk_id) else {
            warn!(chunk_id = %hit.chunk_id, "Lexical hit not in passage store, dropping");
            continue;
        };
        let idx = *by_id.entry(passage.chunk_id.as_str()).or_insert_with(|| {
            candidates.push(RankedCandidate::from_passage(Arc::clone(passage)));
            candidates.len() - 1
        });
        let candidate = &mut candidates[idx];
        candidate.lexical_rank = Some(rank);
        candidate.lexical_score = Some(hit.score);
        candidate.fused_score += 1.0 / (rrf_k + rank as f32);
    }

    for candidate in &mut candidates {
        candidate.tiered_score = candidate.fused_score;
    }

    // Stable sort: insertion order is the final tie-break.
    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.best_rank().cmp(&b.best_rank()))
    });

    candidates
}
