//! Test server harness.
//!
//! Spawns the full gateway on an ephemeral port against temp-dir corpus
//! artifacts, with the deterministic stub embedder/reranker and the
//! call-recording mock provider.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use quarry::{
    AnswerGenerator, CompletionBackend, DenseIndex, Embedder, HybridRetriever, LexicalIndex,
    MockBackend, Passage, PassageStore, QueryExpander, QueryLogger, Reranker, ResponseCache,
    RetrievalConfig, RouterConfig, StubEmbedder, StubReranker,
};
use quarry_server::gateway::{create_router_with_state, HandlerState};

pub const FAST_MODEL: &str = "fast-model";
pub const DEEP_MODEL: &str = "deep-model";
const EMBEDDING_DIM: usize = 32;

#[derive(Debug, Clone)]
pub struct TestServerConfig {
    pub corpus: Vec<Passage>,
    pub response_text: String,
    pub cache_ttl: Duration,
    pub retrieval: RetrievalConfig,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            corpus: default_corpus(),
            response_text: "Plans start at $10 per seat for the starter tier [1].".to_string(),
            cache_ttl: Duration::from_secs(300),
            retrieval: RetrievalConfig::default(),
        }
    }
}

pub fn default_corpus() -> Vec<Passage> {
    vec![
        Passage {
            chunk_id: "pricing_0".to_string(),
            doc_id: "official_pricing.pdf".to_string(),
            section: Some("Plans".to_string()),
            page: Some(1),
            text: "Billing plans include starter, team, and enterprise pricing tiers."
                .to_string(),
        },
        Passage {
            chunk_id: "auth_0".to_string(),
            doc_id: "official_auth.pdf".to_string(),
            section: Some("OAuth".to_string()),
            page: Some(2),
            text: "OAuth tokens expire after one hour and must be rotated.".to_string(),
        },
        Passage {
            chunk_id: "webhook_0".to_string(),
            doc_id: "community_faq.pdf".to_string(),
            section: None,
            page: None,
            text: "Webhook retries use exponential backoff with a five attempt cap.".to_string(),
        },
    ]
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub backend: Arc<MockBackend>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _dir: TempDir,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub async fn spawn_test_server(config: TestServerConfig) -> TestServer {
    let dir = tempfile::tempdir().expect("temp artifact dir");

    let passages =
        Arc::new(PassageStore::from_passages(config.corpus).expect("valid test corpus"));

    let artifact_embedder = StubEmbedder::new(EMBEDDING_DIM);
    let entries: Vec<(String, Vec<f32>)> = passages
        .iter()
        .map(|p| (p.chunk_id.clone(), artifact_embedder.embed_sync(&p.text)))
        .collect();
    DenseIndex::write_artifact(dir.path(), "stub-model", &entries).expect("dense artifact");
    let dense = Arc::new(DenseIndex::load(dir.path()).expect("dense index"));
    let lexical = Arc::new(LexicalIndex::build(&passages, dir.path()).expect("lexical index"));

    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new(EMBEDDING_DIM));
    let reranker: Arc<dyn Reranker> = Arc::new(StubReranker::new());

    let backend = Arc::new(MockBackend::new(config.response_text));
    let completion_backend: Arc<dyn CompletionBackend> = backend.clone();

    let generator = Arc::new(AnswerGenerator::new(
        Arc::clone(&completion_backend),
        FAST_MODEL,
        DEEP_MODEL,
    ));
    let expander = Arc::new(QueryExpander::new(
        completion_backend,
        FAST_MODEL,
        config.retrieval.short_query_words,
        Duration::from_millis(config.retrieval.expansion_timeout_ms),
    ));

    let retriever = Arc::new(HybridRetriever::new(
        dense,
        lexical,
        Arc::clone(&passages),
        Arc::clone(&embedder),
        Arc::clone(&reranker),
        expander,
        config.retrieval.clone(),
    ));

    let state = HandlerState {
        passages,
        retriever,
        generator,
        cache: Arc::new(ResponseCache::new(64, config.cache_ttl)),
        query_log: QueryLogger::disabled(),
        router_config: RouterConfig::default(),
        retrieval_config: config.retrieval,
        cors_origins: vec!["http://localhost:3000".to_string()],
        embedder_stub: embedder.is_stub(),
        reranker_stub: reranker.is_stub(),
    };

    let app = create_router_with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("test server");
    });

    TestServer {
        addr,
        backend,
        shutdown_tx: Some(shutdown_tx),
        _dir: dir,
    }
}
