//! Source reliability tiering.
//!
//! Authoritative sources (official technical/pricing documentation) get a
//! fixed multiplicative boost on their fused score so that authority can
//! outweigh small similarity gaps. Applied after fusion and before
//! reranking; the reranker still dominates for the candidates it scores.

use std::cmp::Ordering;

use super::candidate::RankedCandidate;

/// `true` when the document id matches one of the authoritative prefixes.
pub fn is_authoritative(doc_id: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| doc_id.starts_with(p.as_str()))
}

/// Boosts authoritative candidates and re-sorts by tiered score.
///
/// The sort is stable, so candidates within the same tier keep their fused
/// order; only cross-tier order can change.
pub fn apply_tiering(candidates: &mut Vec<RankedCandidate>, prefixes: &[String], boost: f32) {
    for candidate in candidates.iter_mut() {
        candidate.tiered_score = if is_authoritative(candidate.doc_id(), prefixes) {
            candidate.fused_score * boost
        } else {
            candidate.fused_score
        };
    }

    candidates.sort_by(|a, b| {
        b.tiered_score
            .partial_cmp(&a.tiered_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Deduplicates by chunk id, keeping the first (highest-scored) occurrence.
///
/// Fusion already merges by chunk id; this stage is the invariant guard
/// that the surfaced result can never show the same passage twice.
pub fn dedup_by_chunk(candidates: Vec<RankedCandidate>) -> Vec<RankedCandidate> {
    let mut seen = std::collections::HashSet::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.chunk_id().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Passage;
    use std::sync::Arc;

    fn candidate(chunk_id: &str, doc_id: &str, fused: f32) -> RankedCandidate {
        let mut c = RankedCandidate::from_passage(Arc::new(Passage {
            chunk_id: chunk_id.to_string(),
            doc_id: doc_id.to_string(),
            section: None,
            page: None,
            text: String::new(),
        }));
        c.fused_score = fused;
        c.tiered_score = fused;
        c
    }

    fn prefixes() -> Vec<String> {
        vec!["official_".to_string()]
    }

    #[test]
    fn boost_can_reorder_across_tiers() {
        let mut candidates = vec![
            candidate("a", "community_faq.pdf", 0.032),
            candidate("b", "official_pricing.pdf", 0.030),
        ];
        apply_tiering(&mut candidates, &prefixes(), 1.2);

        // 0.030 * 1.2 = 0.036 > 0.032: authority outweighs the gap.
        assert_eq!(candidates[0].chunk_id(), "b");
        assert!((candidates[0].tiered_score - 0.036).abs() < 1e-6);
        assert!((candidates[1].tiered_score - 0.032).abs() < 1e-6);
    }

    #[test]
    fn same_tier_order_is_preserved() {
        let mut candidates = vec![
            candidate("a", "official_api.pdf", 0.04),
            candidate("b", "official_pricing.pdf", 0.03),
            candidate("c", "community_faq.pdf", 0.02),
        ];
        apply_tiering(&mut candidates, &prefixes(), 1.5);

        let order: Vec<&str> = candidates.iter().map(|c| c.chunk_id()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn unit_boost_changes_nothing() {
        let mut candidates = vec![
            candidate("a", "official_api.pdf", 0.04),
            candidate("b", "community_faq.pdf", 0.03),
        ];
        apply_tiering(&mut candidates, &prefixes(), 1.0);
        assert_eq!(candidates[0].tiered_score, candidates[0].fused_score);
    }

    #[test]
    fn dedup_keeps_the_first_occurrence() {
        let deduped = dedup_by_chunk(vec![
            candidate("a", "doc", 0.04),
            candidate("b", "doc", 0.03),
            candidate("a", "doc", 0.01),
        ]);
        assert_eq!(deduped.len(), 2);
        assert!((deduped[0].fused_score - 0.04).abs() < 1e-9);
    }
}
