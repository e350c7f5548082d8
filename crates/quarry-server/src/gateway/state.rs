use std::sync::Arc;

use quarry::{
    AnswerGenerator, HybridRetriever, PassageStore, QueryLogger, ResponseCache, RetrievalConfig,
    RouterConfig,
};

/// Process-scoped shared state injected into every handler.
///
/// Everything here is either immutable after startup (indices, corpus,
/// configuration) or internally synchronized (response cache, query log).
#[derive(Clone)]
pub struct HandlerState {
    pub passages: Arc<PassageStore>,

    pub retriever: Arc<HybridRetriever>,

    pub generator: Arc<AnswerGenerator>,

    pub cache: Arc<ResponseCache>,

    pub query_log: QueryLogger,

    pub router_config: RouterConfig,

    pub retrieval_config: RetrievalConfig,

    /// Allowed CORS origins (empty allows none).
    pub cors_origins: Vec<String>,

    /// `true` when the embedder is a deterministic stand-in.
    pub embedder_stub: bool,

    /// `true` when the reranker is a deterministic stand-in.
    pub reranker_stub: bool,
}
