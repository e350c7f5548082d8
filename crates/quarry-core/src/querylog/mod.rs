//! Background query logging.
//!
//! Per-request metrics are appended as JSONL by a dedicated task fed over
//! a bounded channel, so disk I/O never blocks the response path. When the
//! channel is full the record is dropped and counted, not awaited.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::evaluation::Flag;
use crate::routing::Tier;

const CHANNEL_CAPACITY: usize = 1024;

/// One logged query with its outcome metrics.
#[derive(Debug, Clone, Serialize)]
pub struct QueryLogRecord {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub tier: Tier,
    pub model_used: String,
    pub routing_score: u32,
    pub tokens_input: u32,
    pub tokens_output: u32,
    pub latency_ms: u64,
    pub retrieval_latency_ms: u64,
    pub candidate_count: usize,
    pub avg_similarity: f32,
    pub evaluator_flags: Vec<Flag>,
    pub cache_hit: bool,
}

/// Handle to the background JSONL writer. Cheap to clone.
#[derive(Clone)]
pub struct QueryLogger {
    tx: Option<mpsc::Sender<QueryLogRecord>>,
}

impl QueryLogger {
    /// Spawns the writer task appending to `path`.
    pub fn spawn(path: PathBuf) -> Self {
        let (tx, mut rx) = mpsc::channel::<QueryLogRecord>(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await;

            let mut file = match file {
                Ok(file) => file,
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Query log disabled: cannot open file");
                    // Drain silently so senders never block.
                    while rx.recv().await.is_some() {}
                    return;
                }
            };

            while let Some(record) = rx.recv().await {
                match serde_json::to_string(&record) {
                    Ok(mut line) => {
                        line.push('\n');
                        if let Err(e) = file.write_all(line.as_bytes()).await {
                            warn!(error = %e, "Query log write failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "Query log serialization failed"),
                }
            }
        });

        Self { tx: Some(tx) }
    }

    /// A logger that discards everything (query logging not configured).
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Enqueues one record; drops it if the channel is full.
    pub fn record(&self, record: QueryLogRecord) {
        if let Some(tx) = &self.tx {
            if tx.try_send(record).is_err() {
                warn!("Query log channel full, dropping record");
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }
}

impl std::fmt::Debug for QueryLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryLogger")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
