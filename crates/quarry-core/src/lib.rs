//! Quarry library crate (used by the server and integration tests).
//!
//! Answers natural-language questions over a fixed, offline-indexed corpus
//! by hybrid retrieval (dense + lexical with reciprocal rank fusion) and
//! grounded generation.
//!
//! # Public API Surface
//!
//! ## Pipeline Components
//! - [`HybridRetriever`], [`RetrievalResult`], [`RankedCandidate`] - the core
//!   retrieval pipeline
//! - [`route_query`], [`RouteDecision`], [`Tier`] - deterministic routing
//! - [`QueryExpander`] - HyDE expansion for short queries
//! - [`AnswerGenerator`], [`CompletionBackend`] - grounded generation
//! - [`evaluate_answer`], [`sanitize_answer`], [`Flag`] - output guardrails
//! - [`ResponseCache`], [`CachedAnswer`] - answer memoization
//!
//! ## Shared Read-Only Resources
//! - [`PassageStore`], [`Passage`] - the corpus
//! - [`DenseIndex`], [`LexicalIndex`] - precomputed indices
//!
//! ## Configuration & Infrastructure
//! - [`Config`], [`RetrievalConfig`], [`RouterConfig`], [`ConfigError`]
//! - [`QueryContext`], [`ChatTurn`] - per-request state
//! - [`QueryLogger`] - background JSONL metrics log
//! - Hashing helpers for cache keys and history fingerprints
//!
//! ## Test/Mock Support
//! Deterministic stand-ins ([`StubEmbedder`], [`StubReranker`],
//! [`MockBackend`]) are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod evaluation;
pub mod expansion;
pub mod generation;
pub mod hashing;
pub mod index;
pub mod query;
pub mod querylog;
pub mod rerank;
pub mod retrieval;
pub mod routing;

pub use cache::{CacheStats, CachedAnswer, EvidenceRef, ResponseCache};
pub use config::{Config, ConfigError, RetrievalConfig, RouterConfig};
pub use corpus::{CorpusError, Passage, PassageStore};
pub use embedding::{Embedder, EmbeddingError, HttpEmbedder};
pub use evaluation::{evaluate_answer, extract_keywords, sanitize_answer, Flag};
pub use expansion::QueryExpander;
pub use generation::{
    AnswerGenerator, Completion, CompletionBackend, GenaiBackend, GenerationError, Prompt,
    TokenStream,
};
pub use hashing::{cache_key, history_fingerprint, normalize_query};
pub use index::{DenseIndex, IndexError, IndexManifest, LexicalIndex, SearchHit};
pub use query::{ChatTurn, QueryContext, TurnRole};
pub use querylog::{QueryLogRecord, QueryLogger};
pub use rerank::{DisabledReranker, HttpReranker, RerankError, Reranker, RerankerConfig};
pub use retrieval::{HybridRetriever, RankedCandidate, RetrievalError, RetrievalMetrics, RetrievalResult};
pub use routing::{route_query, RouteDecision, Tier};

#[cfg(any(test, feature = "mock"))]
pub use embedding::StubEmbedder;
#[cfg(any(test, feature = "mock"))]
pub use generation::{MockBackend, MockCall};
#[cfg(any(test, feature = "mock"))]
pub use rerank::StubReranker;
