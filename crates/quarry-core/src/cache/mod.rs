//! Response cache.
//!
//! A bounded, TTL'd, concurrency-safe memo of final answers keyed by the
//! BLAKE3 hash of the normalized question (plus history fingerprint). A
//! hit short-circuits the whole pipeline; entries are immutable once
//! written and a hit only refreshes recency.

pub mod types;

pub use types::{CachedAnswer, EvidenceRef};

use moka::sync::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Snapshot of cache occupancy for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub capacity: u64,
}

/// Concurrent answer cache with capacity (LRU-class) and TTL eviction.
pub struct ResponseCache {
    entries: Cache<[u8; 32], Arc<CachedAnswer>>,
    capacity: u64,
}

impl ResponseCache {
    pub const DEFAULT_CAPACITY: u64 = 256;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            capacity,
        }
    }

    /// Looks up a cached answer; expired entries read as misses.
    #[inline]
    pub fn get(&self, key: &[u8; 32]) -> Option<Arc<CachedAnswer>> {
        self.entries.get(key)
    }

    /// Stores a completed answer under its normalized-query key.
    #[inline]
    pub fn insert(&self, key: [u8; 32], answer: Arc<CachedAnswer>) {
        self.entries.insert(key, answer);
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.entry_count() == 0
    }

    /// Runs any pending maintenance tasks in the underlying cache.
    #[inline]
    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks();
        CacheStats {
            entries: self.entries.entry_count(),
            capacity: self.capacity,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_TTL)
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing;
    use crate::routing::Tier;

    fn answer(text: &str) -> Arc<CachedAnswer> {
        Arc::new(CachedAnswer {
            answer: text.to_string(),
            sources: vec![],
            model_used: "fast-model".to_string(),
            tier: Tier::Fast,
            routing_score: 0,
            tokens_input: 1,
            tokens_output: 1,
            retrieval_latency_ms: 2,
            candidate_count: 0,
            avg_similarity: 0.0,
            evaluator_flags: vec![],
            created_at: chrono::Utc::now(),
        })
    }

    fn key(question: &str) -> [u8; 32] {
        hashing::cache_key(&hashing::normalize_query(question), None)
    }

    #[test]
    fn hit_returns_the_stored_answer() {
        let cache = ResponseCache::default();
        cache.insert(key("what is sso?"), answer("SSO is single sign-on."));

        let hit = cache.get(&key("What is SSO")).expect("normalized hit");
        assert_eq!(hit.answer, "SSO is single sign-on.");
        assert!(cache.get(&key("unrelated")).is_none());
    }

    #[test]
    fn expired_entries_read_as_misses() {
        let cache = ResponseCache::new(16, Duration::from_millis(20));
        cache.insert(key("q"), answer("a"));
        assert!(cache.get(&key("q")).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key("q")).is_none());
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = ResponseCache::new(4, Duration::from_secs(60));
        for i in 0..32 {
            cache.insert(key(&format!("question {i}")), answer("a"));
        }
        cache.run_pending_tasks();
        assert!(cache.len() <= 4);
    }

    #[test]
    fn concurrent_access_is_safe() {
        let cache = Arc::new(ResponseCache::new(64, Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let k = key(&format!("q {} {}", t, i % 10));
                        cache.insert(k, answer("a"));
                        let _ = cache.get(&k);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        cache.run_pending_tasks();
        assert!(cache.len() <= 64);
    }

    #[test]
    fn stats_report_occupancy() {
        let cache = ResponseCache::new(8, Duration::from_secs(60));
        cache.insert(key("a"), answer("x"));
        let stats = cache.stats();
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.entries, 1);
    }
}
