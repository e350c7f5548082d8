//! Read-only passage store.
//!
//! Passages are produced by the offline ingestion pipeline and loaded once
//! at startup from the artifact's `passages.json`. The store is immutable
//! and shared across requests behind an `Arc`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Filename of the passage metadata artifact inside the artifact directory.
pub const PASSAGES_FILENAME: &str = "passages.json";

/// One retrievable unit of corpus text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Stable identifier, unique within one corpus build.
    pub chunk_id: String,
    /// Source document identifier (filename or logical id).
    pub doc_id: String,
    /// Optional section title within the document.
    #[serde(default)]
    pub section: Option<String>,
    /// Optional page number.
    #[serde(default)]
    pub page: Option<u32>,
    /// Raw passage text.
    pub text: String,
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("duplicate chunk_id in corpus: {chunk_id}")]
    DuplicateChunkId { chunk_id: String },
}

/// Immutable, process-shared collection of passages indexed by `chunk_id`.
pub struct PassageStore {
    passages: Vec<Arc<Passage>>,
    by_id: HashMap<String, usize>,
}

impl PassageStore {
    /// Loads `passages.json` from the artifact directory.
    pub fn load(artifact_dir: &Path) -> Result<Self, CorpusError> {
        let path = artifact_dir.join(PASSAGES_FILENAME);
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(&path).map_err(|source| CorpusError::Io {
            path: display.clone(),
            source,
        })?;
        let passages: Vec<Passage> =
            serde_json::from_str(&raw).map_err(|source| CorpusError::Parse {
                path: display,
                source,
            })?;
        Self::from_passages(passages)
    }

    /// Builds a store from an in-memory passage list (tests, offline tools).
    pub fn from_passages(passages: Vec<Passage>) -> Result<Self, CorpusError> {
        let mut by_id = HashMap::with_capacity(passages.len());
        let passages: Vec<Arc<Passage>> = passages.into_iter().map(Arc::new).collect();
        for (idx, passage) in passages.iter().enumerate() {
            if by_id.insert(passage.chunk_id.clone(), idx).is_some() {
                return Err(CorpusError::DuplicateChunkId {
                    chunk_id: passage.chunk_id.clone(),
                });
            }
        }
        Ok(Self { passages, by_id })
    }

    /// Looks up a passage by its chunk id.
    #[inline]
    pub fn get(&self, chunk_id: &str) -> Option<&Arc<Passage>> {
        self.by_id.get(chunk_id).map(|&idx| &self.passages[idx])
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.passages.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Iterates passages in artifact order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Passage>> {
        self.passages.iter()
    }
}

impl std::fmt::Debug for PassageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassageStore")
            .field("passages", &self.passages.len())
            .finish()
    }
}
