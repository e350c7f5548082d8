//! Lexical (BM25) index.
//!
//! Tantivy-backed keyword search over passage text. Dense retrieval misses
//! exact terminology and error codes ("OAuth 403"); this index guarantees
//! literal token recall, fused downstream with the dense ranking.
//!
//! `build` is the offline half (ingestion and test fixtures); the server
//! only calls `load` + `search`. Searches are synchronous and CPU-bound;
//! callers on the async path wrap them in `spawn_blocking`.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, ReloadPolicy, TantivyDocument};
use tracing::info;

use super::error::IndexError;
use super::SearchHit;
use crate::corpus::PassageStore;

/// Subdirectory of the artifact directory holding the tantivy index.
pub const LEXICAL_DIRNAME: &str = "lexical";

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Read-only BM25 index over passage text.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    chunk_id_field: Field,
    text_field: Field,
}

impl LexicalIndex {
    fn schema() -> (Schema, Field, Field) {
        let mut builder = Schema::builder();
        let chunk_id_field = builder.add_text_field("chunk_id", STRING | STORED);
        let text_field = builder.add_text_field("text", TEXT);
        (builder.build(), chunk_id_field, text_field)
    }

    /// Builds the index from the passage store into
    /// `{artifact_dir}/lexical/`. Offline only.
    pub fn build(passages: &PassageStore, artifact_dir: &Path) -> Result<Self, IndexError> {
        let lexical_dir = artifact_dir.join(LEXICAL_DIRNAME);
        std::fs::create_dir_all(&lexical_dir).map_err(|source| IndexError::Io {
            path: lexical_dir.clone(),
            source,
        })?;

        let (schema, chunk_id_field, text_field) = Self::schema();
        let index = Index::create_in_dir(&lexical_dir, schema)?;

        let mut writer = index.writer(WRITER_HEAP_BYTES)?;
        for passage in passages.iter() {
            writer.add_document(doc!(
                chunk_id_field => passage.chunk_id.clone(),
                text_field => passage.text.clone(),
            ))?;
        }
        writer.commit()?;

        info!(passages = passages.len(), "Lexical index built");

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            chunk_id_field,
            text_field,
        })
    }

    /// Opens a previously built index from `{artifact_dir}/lexical/`.
    pub fn load(artifact_dir: &Path) -> Result<Self, IndexError> {
        let lexical_dir = artifact_dir.join(LEXICAL_DIRNAME);
        if !lexical_dir.exists() {
            return Err(IndexError::ArtifactNotFound { path: lexical_dir });
        }

        let index = Index::open_in_dir(&lexical_dir)?;
        let schema = index.schema();
        let chunk_id_field = schema.get_field("chunk_id")?;
        let text_field = schema.get_field("text")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;

        info!("Lexical index loaded");

        Ok(Self {
            index,
            reader,
            chunk_id_field,
            text_field,
        })
    }

    /// Returns the `top_n` passages by BM25 relevance, descending.
    ///
    /// The raw question is stripped to lowercase alphanumeric tokens before
    /// parsing so user punctuation never hits tantivy's query syntax.
    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<SearchHit>, IndexError> {
        let sanitized = sanitize_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let parsed = parser.parse_query(&sanitized)?;

        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(top_n))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let document: TantivyDocument = searcher.doc(address)?;
            if let Some(chunk_id) = document
                .get_first(self.chunk_id_field)
                .and_then(|v| v.as_str())
            {
                hits.push(SearchHit {
                    chunk_id: chunk_id.to_string(),
                    score,
                });
            }
        }
        Ok(hits)
    }
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex").finish_non_exhaustive()
    }
}

/// Lowercases and strips everything but alphanumerics so the parser sees
/// plain terms.
fn sanitize_query(query: &str) -> String {
    let lowered = query.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Passage;

    fn passage(chunk_id: &str, text: &str) -> Passage {
        Passage {
            chunk_id: chunk_id.to_string(),
            doc_id: "doc".to_string(),
            section: None,
            page: None,
            text: text.to_string(),
        }
    }

    fn store() -> PassageStore {
        PassageStore::from_passages(vec![
            passage("p_0", "OAuth tokens expire after one hour by default."),
            passage("p_1", "Billing plans include starter, team, and enterprise."),
            passage("p_2", "Webhook retries use exponential backoff."),
        ])
        .unwrap()
    }

    #[test]
    fn build_and_search_finds_keyword_matches() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::build(&store(), dir.path()).unwrap();

        let hits = index.search("oauth token expiry", 5).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].chunk_id, "p_0");
    }

    #[test]
    fn load_reopens_a_built_index() {
        let dir = tempfile::tempdir().unwrap();
        LexicalIndex::build(&store(), dir.path()).unwrap();

        let reopened = LexicalIndex::load(dir.path()).unwrap();
        let hits = reopened.search("billing enterprise", 5).unwrap();
        assert_eq!(hits[0].chunk_id, "p_1");
    }

    #[test]
    fn punctuation_heavy_queries_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::build(&store(), dir.path()).unwrap();

        // Raw quotes and operators must not reach the query parser.
        let hits = index.search("\"webhook\" AND retries??", 5).unwrap();
        assert_eq!(hits[0].chunk_id, "p_2");
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let index = LexicalIndex::build(&store(), dir.path()).unwrap();
        assert!(index.search("?!.", 5).unwrap().is_empty());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LexicalIndex::load(dir.path()),
            Err(IndexError::ArtifactNotFound { .. })
        ));
    }
}
