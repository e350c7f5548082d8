//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `QUARRY_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

/// Server and pipeline configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `QUARRY_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Directory holding the precomputed corpus artifacts
    /// (`passages.json`, `manifest.json`, `embeddings.f32`, `lexical/`).
    /// Default: `./.artifacts`.
    pub artifact_dir: PathBuf,

    /// Embedding service endpoint (OpenAI-style `/v1/embeddings`).
    /// Unset runs the embedder in stub mode (mock builds only).
    pub embedder_url: Option<String>,

    /// Embedding model identifier sent to the embedding service.
    pub embedding_model: String,

    /// Cross-encoder rerank service endpoint. Unset runs the reranker in
    /// stub mode (mock builds only).
    pub reranker_url: Option<String>,

    /// Model id used for the `fast` generation tier.
    pub fast_model: String,

    /// Model id used for the `deep` generation tier.
    pub deep_model: String,

    /// Max entries in the response cache. Default: `256`.
    pub cache_capacity: u64,

    /// Response cache time-to-live in seconds. Default: `300`.
    pub cache_ttl_secs: u64,

    /// Comma-separated allowed CORS origins.
    pub cors_origins: Vec<String>,

    /// Optional JSONL query-log path. Unset disables query logging.
    pub query_log_path: Option<PathBuf>,

    /// Retrieval pipeline tunables.
    pub retrieval: RetrievalConfig,

    /// Query router tunables.
    pub router: RouterConfig,
}

/// Tunables for the hybrid retrieval pipeline.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Candidate pool size per source (N); must exceed `top_k`.
    pub candidate_pool: usize,

    /// Final evidence cap (k).
    pub top_k: usize,

    /// Reciprocal-rank-fusion smoothing constant.
    pub rrf_k: f32,

    /// How many tiered candidates the reranker scores (M < N).
    pub rerank_depth: usize,

    /// Hard floor for the dynamic rerank threshold.
    pub score_floor: f32,

    /// Fused-score keep clause: candidates above this survive thresholding
    /// regardless of rerank score (cross-source agreement).
    pub fusion_keep_floor: f32,

    /// Multiplicative boost for authoritative sources (>= 1.0).
    pub authority_boost: f32,

    /// Document-id prefixes treated as authoritative sources.
    pub authoritative_prefixes: Vec<String>,

    /// Dense-similarity gate above which reranking is skipped.
    pub rerank_bypass_gate: f32,

    /// Queries shorter than this many words are HyDE-expanded.
    pub short_query_words: usize,

    /// Hard timeout for the expansion call, in milliseconds.
    pub expansion_timeout_ms: u64,

    /// Greedy character budget for the surfaced evidence.
    pub max_context_chars: usize,

    /// Dense similarity above which a passage counts as valid evidence
    /// for the output evaluator.
    pub evidence_similarity_floor: f32,

    /// Minimum answer/evidence keyword-overlap ratio before the
    /// `unverified_claim` flag fires.
    pub min_overlap_ratio: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidate_pool: 15,
            top_k: 8,
            rrf_k: 60.0,
            rerank_depth: 6,
            score_floor: 0.15,
            fusion_keep_floor: 0.025,
            authority_boost: 1.2,
            authoritative_prefixes: vec!["official_".to_string(), "pricing_".to_string()],
            rerank_bypass_gate: 0.6,
            short_query_words: 8,
            expansion_timeout_ms: 2_500,
            max_context_chars: 7_200,
            evidence_similarity_floor: 0.3,
            min_overlap_ratio: 0.2,
        }
    }
}

impl RetrievalConfig {
    /// Checks internal consistency of the tunables.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::InvalidRetrieval {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        if self.candidate_pool < self.top_k {
            return Err(ConfigError::InvalidRetrieval {
                reason: format!(
                    "candidate_pool ({}) must be >= top_k ({})",
                    self.candidate_pool, self.top_k
                ),
            });
        }
        if self.rerank_depth == 0 || self.rerank_depth > self.candidate_pool {
            return Err(ConfigError::InvalidRetrieval {
                reason: format!(
                    "rerank_depth ({}) must be in 1..={}",
                    self.rerank_depth, self.candidate_pool
                ),
            });
        }
        if self.authority_boost < 1.0 {
            return Err(ConfigError::InvalidRetrieval {
                reason: format!("authority_boost ({}) must be >= 1.0", self.authority_boost),
            });
        }
        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            return Err(ConfigError::InvalidRetrieval {
                reason: format!("rrf_k ({}) must be a positive finite value", self.rrf_k),
            });
        }
        Ok(())
    }
}

/// Tunables for the deterministic query router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Word count above which the length category scores.
    pub length_word_threshold: usize,

    /// Total score at or above which the deep tier is selected.
    pub deep_threshold: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            length_word_threshold: 15,
            deep_threshold: 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            artifact_dir: PathBuf::from("./.artifacts"),
            embedder_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            reranker_url: None,
            fast_model: "llama-3.1-8b-instant".to_string(),
            deep_model: "llama-3.3-70b-versatile".to_string(),
            cache_capacity: 256,
            cache_ttl_secs: 300,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            query_log_path: None,
            retrieval: RetrievalConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "QUARRY_PORT";
    const ENV_BIND_ADDR: &'static str = "QUARRY_BIND_ADDR";
    const ENV_ARTIFACT_DIR: &'static str = "QUARRY_ARTIFACT_DIR";
    const ENV_EMBEDDER_URL: &'static str = "QUARRY_EMBEDDER_URL";
    const ENV_EMBEDDING_MODEL: &'static str = "QUARRY_EMBEDDING_MODEL";
    const ENV_RERANKER_URL: &'static str = "QUARRY_RERANKER_URL";
    const ENV_FAST_MODEL: &'static str = "QUARRY_FAST_MODEL";
    const ENV_DEEP_MODEL: &'static str = "QUARRY_DEEP_MODEL";
    const ENV_CACHE_CAPACITY: &'static str = "QUARRY_CACHE_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "QUARRY_CACHE_TTL_SECS";
    const ENV_CORS_ORIGINS: &'static str = "QUARRY_CORS_ORIGINS";
    const ENV_QUERY_LOG: &'static str = "QUARRY_QUERY_LOG";
    const ENV_TOP_K: &'static str = "QUARRY_TOP_K";
    const ENV_CANDIDATE_POOL: &'static str = "QUARRY_CANDIDATE_POOL";
    const ENV_AUTHORITATIVE_PREFIXES: &'static str = "QUARRY_AUTHORITATIVE_PREFIXES";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = Self::parse_port_from_env(defaults.port)?;
        let bind_addr = Self::parse_bind_addr_from_env(defaults.bind_addr)?;
        let artifact_dir = Self::parse_path_from_env(Self::ENV_ARTIFACT_DIR, defaults.artifact_dir);
        let embedder_url = Self::parse_optional_string_from_env(Self::ENV_EMBEDDER_URL);
        let embedding_model =
            Self::parse_string_from_env(Self::ENV_EMBEDDING_MODEL, defaults.embedding_model);
        let reranker_url = Self::parse_optional_string_from_env(Self::ENV_RERANKER_URL);
        let fast_model = Self::parse_string_from_env(Self::ENV_FAST_MODEL, defaults.fast_model);
        let deep_model = Self::parse_string_from_env(Self::ENV_DEEP_MODEL, defaults.deep_model);
        let cache_capacity =
            Self::parse_u64_from_env(Self::ENV_CACHE_CAPACITY, defaults.cache_capacity);
        let cache_ttl_secs =
            Self::parse_u64_from_env(Self::ENV_CACHE_TTL_SECS, defaults.cache_ttl_secs);
        let cors_origins = Self::parse_list_from_env(Self::ENV_CORS_ORIGINS, defaults.cors_origins);
        let query_log_path = Self::parse_optional_string_from_env(Self::ENV_QUERY_LOG)
            .map(PathBuf::from);

        let mut retrieval = defaults.retrieval;
        if let Some(top_k) = Self::parse_optional_usize_from_env(Self::ENV_TOP_K) {
            retrieval.top_k = top_k;
        }
        if let Some(pool) = Self::parse_optional_usize_from_env(Self::ENV_CANDIDATE_POOL) {
            retrieval.candidate_pool = pool;
        }
        retrieval.authoritative_prefixes = Self::parse_list_from_env(
            Self::ENV_AUTHORITATIVE_PREFIXES,
            retrieval.authoritative_prefixes.clone(),
        );

        Ok(Self {
            port,
            bind_addr,
            artifact_dir,
            embedder_url,
            embedding_model,
            reranker_url,
            fast_model,
            deep_model,
            cache_capacity,
            cache_ttl_secs,
            cors_origins,
            query_log_path,
            retrieval,
            router: defaults.router,
        })
    }

    /// Validates paths and numeric invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.artifact_dir.exists() {
            return Err(ConfigError::PathNotFound {
                path: self.artifact_dir.clone(),
            });
        }
        if !self.artifact_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.artifact_dir.clone(),
            });
        }
        self.retrieval.validate()
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_u64_from_env(var_name: &str, default: u64) -> u64 {
        env::var(var_name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_optional_usize_from_env(var_name: &str) -> Option<usize> {
        env::var(var_name).ok().and_then(|v| v.parse().ok())
    }

    fn parse_list_from_env(var_name: &str, default: Vec<String>) -> Vec<String> {
        match env::var(var_name) {
            Ok(value) => value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => default,
        }
    }
}
