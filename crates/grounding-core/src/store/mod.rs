//! Storage traits for the contribution engine.
//!
//! [`DocumentRepository`] owns the system-of-record table;
//! [`VectorStore`] owns the derived chunk/embedding rows. The two are
//! deliberately decoupled: chunks reference their document only through
//! the stringified `doc_id` in their metadata, and the ingestion
//! pipeline keeps them consistent by always deleting a document's
//! chunks before writing a new generation.
//!
//! In-memory implementations for tests live in [`memory`]; the
//! application crate provides the SQLite implementations.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::metadata::{META_AUTHOR_ID, META_CHUNK_INDEX, META_DOC_ID, META_DOMAIN_KEY, META_LANGUAGE_KEY};
use crate::models::{Document, DocumentPatch, Language, NewDocument};

/// A (text, metadata) pair ready to be embedded and stored.
#[derive(Debug, Clone)]
pub struct ChunkInsert {
    pub content: String,
    pub metadata: Value,
}

/// A chunk returned from similarity search, with its score and the
/// identity fields parsed out of the metadata for ranking.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub content: String,
    pub metadata: Value,
    pub score: f64,
    pub doc_id: String,
    pub chunk_index: i64,
}

/// Exact-match metadata restrictions for similarity search. A `None`
/// field imposes no constraint.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub domain_key: Option<String>,
    pub language: Option<Language>,
    pub author_id: Option<i64>,
}

impl ChunkFilter {
    /// Whether a chunk's metadata satisfies every supplied filter key.
    pub fn matches(&self, metadata: &Value) -> bool {
        if let Some(domain_key) = &self.domain_key {
            if metadata.get(META_DOMAIN_KEY).and_then(Value::as_str) != Some(domain_key) {
                return false;
            }
        }
        if let Some(language) = self.language {
            if metadata.get(META_LANGUAGE_KEY).and_then(Value::as_str) != Some(language.as_str()) {
                return false;
            }
        }
        if let Some(author_id) = self.author_id {
            let wanted = author_id.to_string();
            if metadata.get(META_AUTHOR_ID).and_then(Value::as_str) != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Parse the (`doc_id`, `chunk_index`) identity pair out of a chunk's
/// metadata map. Missing or malformed fields degrade to defaults rather
/// than failing retrieval.
pub fn chunk_identity(metadata: &Value) -> (String, i64) {
    let doc_id = metadata
        .get(META_DOC_ID)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let chunk_index = metadata
        .get(META_CHUNK_INDEX)
        .and_then(Value::as_i64)
        .unwrap_or(0);
    (doc_id, chunk_index)
}

/// Vector index over chunk rows: append, delete-by-document, and
/// metadata-filtered similarity search. Implementations embed the texts
/// themselves via an [`EmbeddingClient`](crate::embedding::EmbeddingClient).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed each chunk and durably append one row per chunk. Returns
    /// the number of rows written. An empty input writes nothing and
    /// must not touch the embedding client.
    async fn add_documents(&self, chunks: Vec<ChunkInsert>) -> Result<usize>;

    /// Remove every row whose metadata `doc_id` string-equals the given
    /// id. Safe to call when nothing matches; returns the removed count.
    async fn delete_by_document_id(&self, doc_id: &str) -> Result<u64>;

    /// Return up to `top_k` chunks most similar to `query`, restricted
    /// to rows matching `filter`, in the deterministic order imposed by
    /// [`rank_candidates`](crate::retrieval::rank_candidates).
    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>>;
}

/// System-of-record CRUD for contributed documents. Read, update, and
/// delete are ownership-scoped: they fail with `NotFound` unless the
/// document exists *and* belongs to `author_id`.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, doc: NewDocument) -> Result<Document>;

    async fn get(&self, author_id: i64, id: i64) -> Result<Document>;

    /// Documents owned by `author_id` with id greater than `after_id`,
    /// ordered by ascending id, at most `limit` of them.
    async fn list(&self, author_id: i64, limit: i64, after_id: Option<i64>)
        -> Result<Vec<Document>>;

    /// Merge `patch` into the stored row and bump `updated_at`.
    async fn update(&self, author_id: i64, id: i64, patch: DocumentPatch) -> Result<Document>;

    async fn delete(&self, author_id: i64, id: i64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_filter_matches_everything() {
        let filter = ChunkFilter::default();
        assert!(filter.matches(&json!({})));
        assert!(filter.matches(&json!({ "domain_key": "health" })));
    }

    #[test]
    fn domain_filter_is_exact() {
        let filter = ChunkFilter {
            domain_key: Some("health".into()),
            ..Default::default()
        };
        assert!(filter.matches(&json!({ "domain_key": "health" })));
        assert!(!filter.matches(&json!({ "domain_key": "finance" })));
        assert!(!filter.matches(&json!({ "domain_key": null })));
        assert!(!filter.matches(&json!({})));
    }

    #[test]
    fn author_filter_compares_stringified_ids() {
        let filter = ChunkFilter {
            author_id: Some(7),
            ..Default::default()
        };
        assert!(filter.matches(&json!({ "author_id": "7" })));
        // numeric 7 is not the stored form; stored ids are strings
        assert!(!filter.matches(&json!({ "author_id": 7 })));
        assert!(!filter.matches(&json!({ "author_id": "8" })));
    }

    #[test]
    fn filters_combine_conjunctively() {
        let filter = ChunkFilter {
            domain_key: Some("health".into()),
            language: Some(Language::En),
            ..Default::default()
        };
        assert!(filter.matches(&json!({ "domain_key": "health", "language_key": "en" })));
        assert!(!filter.matches(&json!({ "domain_key": "health", "language_key": "id" })));
    }

    #[test]
    fn chunk_identity_parses_metadata() {
        let (doc_id, index) = chunk_identity(&json!({ "doc_id": "42", "chunk_index": 3 }));
        assert_eq!(doc_id, "42");
        assert_eq!(index, 3);

        let (doc_id, index) = chunk_identity(&json!({}));
        assert_eq!(doc_id, "");
        assert_eq!(index, 0);
    }
}
