//! Confidence thresholding.
//!
//! The dynamic threshold adapts to the rerank score distribution:
//! `cutoff = max(mean − std, floor)`. The floor keeps a flat, uniformly low
//! distribution from admitting clearly irrelevant candidates. A candidate
//! whose fused score shows strong cross-source agreement survives the
//! cutoff regardless of its rerank score.

use super::candidate::RankedCandidate;

/// Population mean and standard deviation.
pub fn mean_std(scores: &[f32]) -> (f32, f32) {
    if scores.is_empty() {
        return (0.0, 0.0);
    }
    let n = scores.len() as f32;
    let mean = scores.iter().sum::<f32>() / n;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}

/// The adaptive cutoff for a rerank score distribution.
pub fn dynamic_cutoff(scores: &[f32], floor: f32) -> f32 {
    let (mean, std) = mean_std(scores);
    (mean - std).max(floor)
}

/// Filters the reranked candidate set against the dynamic cutoff.
///
/// Candidates without a rerank score are judged by the keep clause alone.
/// Returns the empty set when everything falls below the cutoff; that is a
/// legitimate outcome, not an error.
pub fn apply_dynamic_threshold(
    candidates: Vec<RankedCandidate>,
    floor: f32,
    fusion_keep_floor: f32,
) -> Vec<RankedCandidate> {
    let scores: Vec<f32> = candidates.iter().filter_map(|c| c.rerank_score).collect();
    if scores.is_empty() {
        return apply_static_floor(candidates, floor, fusion_keep_floor);
    }
    let cutoff = dynamic_cutoff(&scores, floor);

    candidates
        .into_iter()
        .filter(|c| match c.rerank_score {
            Some(score) => score >= cutoff || c.fused_score > fusion_keep_floor,
            None => c.fused_score > fusion_keep_floor,
        })
        .collect()
}

/// Coarse static filter used when reranking was skipped or unavailable:
/// keep candidates with adequate dense similarity or strong cross-source
/// agreement.
///
/// When no candidate carries a dense similarity at all (the dense source
/// was down and everything came from the lexical ranking), the filter is a
/// no-op: single-source degraded mode trusts the lexical order.
pub fn apply_static_floor(
    candidates: Vec<RankedCandidate>,
    floor: f32,
    fusion_keep_floor: f32,
) -> Vec<RankedCandidate> {
    if candidates.iter().all(|c| c.dense_similarity.is_none()) {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| {
            c.dense_similarity.unwrap_or(0.0) >= floor || c.fused_score > fusion_keep_floor
        })
        .collect()
}
