//! Dense vector index.
//!
//! A flat inner-product index over L2-normalized passage embeddings: a
//! memory-mapped row-major f32 matrix plus a JSON manifest carrying the
//! dimension and the row-to-chunk-id mapping. Search is an exact scan;
//! corpora here are tens of thousands of passages, not millions, and the
//! scan keeps scoring reproducible.

use std::cmp::Ordering;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::IndexError;
use super::SearchHit;

/// Manifest filename inside the artifact directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Raw embedding matrix filename inside the artifact directory.
pub const EMBEDDINGS_FILENAME: &str = "embeddings.f32";

/// Describes the embedding matrix: produced at ingestion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Model that produced the corpus embeddings.
    pub embedding_model: String,
    /// Vector dimension (floats per row).
    pub embedding_dim: usize,
    /// Chunk id of each matrix row, in row order.
    pub chunk_ids: Vec<String>,
}

/// Read-only dense index over the memory-mapped embedding matrix.
///
/// An empty corpus maps to no matrix at all; mapping a zero-length file is
/// platform-dependent, so the empty case is represented explicitly.
pub struct DenseIndex {
    mmap: Option<Mmap>,
    manifest: IndexManifest,
}

impl DenseIndex {
    /// Maps the embedding matrix and reads the manifest from `artifact_dir`.
    pub fn load(artifact_dir: &Path) -> Result<Self, IndexError> {
        let manifest_path = artifact_dir.join(MANIFEST_FILENAME);
        if !manifest_path.exists() {
            return Err(IndexError::ArtifactNotFound {
                path: manifest_path,
            });
        }
        let raw = std::fs::read_to_string(&manifest_path).map_err(|source| IndexError::Io {
            path: manifest_path.clone(),
            source,
        })?;
        let manifest: IndexManifest = serde_json::from_str(&raw)?;

        let matrix_path = artifact_dir.join(EMBEDDINGS_FILENAME);
        let expected = manifest.chunk_ids.len() * manifest.embedding_dim * 4;

        let mmap = if expected == 0 {
            None
        } else {
            let file = File::open(&matrix_path).map_err(|source| IndexError::Io {
                path: matrix_path.clone(),
                source,
            })?;
            // SAFETY: the artifact is written once offline and never mutated
            // while the server runs; the mapping is read-only.
            let mapped = unsafe {
                Mmap::map(&file).map_err(|source| IndexError::Io {
                    path: matrix_path,
                    source,
                })?
            };
            if mapped.len() != expected {
                return Err(IndexError::MatrixSizeMismatch {
                    actual_bytes: mapped.len(),
                    rows: manifest.chunk_ids.len(),
                    dim: manifest.embedding_dim,
                });
            }
            Some(mapped)
        };

        info!(
            rows = manifest.chunk_ids.len(),
            dim = manifest.embedding_dim,
            model = %manifest.embedding_model,
            "Dense index mapped"
        );

        Ok(Self { mmap, manifest })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.manifest.chunk_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.manifest.chunk_ids.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.manifest.embedding_dim
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Inner product of `query` with row `row`.
    fn dot(&self, matrix: &Mmap, row: usize, query: &[f32]) -> f32 {
        let dim = self.manifest.embedding_dim;
        let start = row * dim * 4;
        let bytes = &matrix[start..start + dim * 4];
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .zip(query)
            .map(|(x, q)| x * q)
            .sum()
    }

    /// Returns the `top_n` rows by inner-product similarity, descending.
    ///
    /// With normalized rows and a normalized query this is cosine
    /// similarity. Ties break by row order for reproducibility.
    pub fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<SearchHit>, IndexError> {
        let Some(matrix) = &self.mmap else {
            return Ok(Vec::new());
        };
        if query.len() != self.manifest.embedding_dim {
            return Err(IndexError::QueryDimensionMismatch {
                expected: self.manifest.embedding_dim,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|row| (row, self.dot(matrix, row, query)))
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_n);

        Ok(scored
            .into_iter()
            .map(|(row, score)| SearchHit {
                chunk_id: self.manifest.chunk_ids[row].clone(),
                score,
            })
            .collect())
    }

    /// Writes a dense artifact (manifest + matrix) to `artifact_dir`.
    ///
    /// This is the offline half of the index; the server only ever calls
    /// [`DenseIndex::load`]. Also used by tests to assemble fixtures.
    pub fn write_artifact(
        artifact_dir: &Path,
        embedding_model: &str,
        entries: &[(String, Vec<f32>)],
    ) -> Result<(), IndexError> {
        let dim = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        let manifest = IndexManifest {
            embedding_model: embedding_model.to_string(),
            embedding_dim: dim,
            chunk_ids: entries.iter().map(|(id, _)| id.clone()).collect(),
        };

        let manifest_path = artifact_dir.join(MANIFEST_FILENAME);
        std::fs::write(
            &manifest_path,
            serde_json::to_string_pretty(&manifest)?,
        )
        .map_err(|source| IndexError::Io {
            path: manifest_path,
            source,
        })?;

        let mut bytes = Vec::with_capacity(entries.len() * dim * 4);
        for (_, vector) in entries {
            for value in vector {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        let matrix_path = artifact_dir.join(EMBEDDINGS_FILENAME);
        std::fs::write(&matrix_path, bytes).map_err(|source| IndexError::Io {
            path: matrix_path,
            source,
        })?;

        Ok(())
    }
}

impl std::fmt::Debug for DenseIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseIndex")
            .field("rows", &self.len())
            .field("dim", &self.dimension())
            .finish()
    }
}
