//! Quarry HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use quarry::{
    AnswerGenerator, CompletionBackend, Config, DenseIndex, DisabledReranker, Embedder,
    GenaiBackend, HttpEmbedder, HttpReranker, HybridRetriever, LexicalIndex, PassageStore,
    QueryExpander, QueryLogger, Reranker, RerankerConfig, ResponseCache,
};
use quarry_server::gateway::{create_router_with_state, HandlerState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!(
        r#"
  ██████╗ ██╗   ██╗ █████╗ ██████╗ ██████╗ ██╗   ██╗
 ██╔═══██╗██║   ██║██╔══██╗██╔══██╗██╔══██╗╚██╗ ██╔╝
 ██║   ██║██║   ██║███████║██████╔╝██████╔╝ ╚████╔╝
 ██║▄▄ ██║██║   ██║██╔══██║██╔══██╗██╔══██╗  ╚██╔╝
 ╚██████╔╝╚██████╔╝██║  ██║██║  ██║██║  ██║   ██║
  ╚══▀▀═╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝

        RETRIEVE. FUSE. GROUND.
                                        AGPL-3.0
"#
    );

    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        artifact_dir = %config.artifact_dir.display(),
        "Quarry starting"
    );

    // Read-only corpus resources, loaded once and shared by every request.
    let passages = Arc::new(
        PassageStore::load(&config.artifact_dir).context("loading passage store")?,
    );
    let dense = Arc::new(DenseIndex::load(&config.artifact_dir).context("loading dense index")?);
    let lexical =
        Arc::new(LexicalIndex::load(&config.artifact_dir).context("loading lexical index")?);
    tracing::info!(
        passages = passages.len(),
        dense_rows = dense.len(),
        "Corpus artifacts loaded"
    );

    let embedder_url = config
        .embedder_url
        .clone()
        .context("QUARRY_EMBEDDER_URL must be set: the online path cannot embed queries without an embedding service")?;
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(
        embedder_url,
        config.embedding_model.clone(),
        dense.dimension(),
    ));

    let reranker_disabled = config.reranker_url.is_none();
    let reranker: Arc<dyn Reranker> = match &config.reranker_url {
        Some(url) => Arc::new(HttpReranker::new(RerankerConfig::new(url.clone()))),
        None => {
            tracing::warn!(
                "No QUARRY_RERANKER_URL configured, retrieval will use the fused/tiered ordering"
            );
            Arc::new(DisabledReranker)
        }
    };

    let backend: Arc<dyn CompletionBackend> = Arc::new(GenaiBackend::new());
    let generator = Arc::new(AnswerGenerator::new(
        Arc::clone(&backend),
        config.fast_model.clone(),
        config.deep_model.clone(),
    ));
    let expander = Arc::new(QueryExpander::new(
        backend,
        config.fast_model.clone(),
        config.retrieval.short_query_words,
        Duration::from_millis(config.retrieval.expansion_timeout_ms),
    ));

    let retriever = Arc::new(HybridRetriever::new(
        dense,
        lexical,
        Arc::clone(&passages),
        Arc::clone(&embedder),
        reranker,
        expander,
        config.retrieval.clone(),
    ));

    let cache = Arc::new(ResponseCache::new(
        config.cache_capacity,
        Duration::from_secs(config.cache_ttl_secs),
    ));

    let query_log = match &config.query_log_path {
        Some(path) => QueryLogger::spawn(path.clone()),
        None => QueryLogger::disabled(),
    };

    // Warm the embedding path so the first query skips the cold start.
    match embedder.embed("warmup query").await {
        Ok(_) => tracing::info!("Embedder warmup complete"),
        Err(e) => tracing::warn!(error = %e, "Embedder warmup failed, continuing"),
    }

    let state = HandlerState {
        passages,
        retriever,
        generator,
        cache,
        query_log,
        router_config: config.router.clone(),
        retrieval_config: config.retrieval.clone(),
        cors_origins: config.cors_origins.clone(),
        embedder_stub: embedder.is_stub(),
        reranker_stub: reranker_disabled,
    };

    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Quarry shutdown complete");
    Ok(())
}

fn run_health_check() -> i32 {
    let port = std::env::var("QUARRY_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let url = format!("http://127.0.0.1:{}/healthz", port);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    rt.block_on(async {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .expect("failed to build client");

        match client.get(&url).send().await {
            Ok(res) if res.status().is_success() => 0,
            _ => 1,
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
