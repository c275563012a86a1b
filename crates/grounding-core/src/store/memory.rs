//! In-memory implementations of the storage traits for tests and for
//! embedding the engine without a database.
//!
//! `HashMap`/`Vec` behind `std::sync::RwLock`; vector search is
//! brute-force cosine similarity over every stored row.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::embedding::{cosine_similarity, EmbeddingClient};
use crate::error::{Error, Result};
use crate::metadata::META_DOC_ID;
use crate::models::{Document, DocumentPatch, NewDocument};
use crate::retrieval::rank_candidates;

use super::{chunk_identity, ChunkFilter, ChunkInsert, DocumentRepository, ScoredChunk, VectorStore};

/// In-memory system-of-record table keyed by generated integer id.
pub struct MemoryDocumentRepository {
    docs: RwLock<BTreeMap<i64, Document>>,
    next_id: AtomicI64,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryDocumentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = chrono::Utc::now().timestamp();
        let stored = Document {
            id,
            text: doc.text,
            kind: doc.kind,
            domain_key: doc.domain_key,
            language: doc.language,
            author_id: doc.author_id,
            source: doc.source,
            extra: doc.extra,
            visibility: doc.visibility,
            created_at: now,
            updated_at: now,
        };
        self.docs.write().unwrap().insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, author_id: i64, id: i64) -> Result<Document> {
        self.docs
            .read()
            .unwrap()
            .get(&id)
            .filter(|doc| doc.author_id == Some(author_id))
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list(
        &self,
        author_id: i64,
        limit: i64,
        after_id: Option<i64>,
    ) -> Result<Vec<Document>> {
        let floor = after_id.unwrap_or(0);
        Ok(self
            .docs
            .read()
            .unwrap()
            .range((floor + 1)..)
            .filter(|(_, doc)| doc.author_id == Some(author_id))
            .take(limit.max(0) as usize)
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn update(&self, author_id: i64, id: i64, patch: DocumentPatch) -> Result<Document> {
        let mut docs = self.docs.write().unwrap();
        let doc = docs
            .get_mut(&id)
            .filter(|doc| doc.author_id == Some(author_id))
            .ok_or(Error::NotFound)?;
        patch.apply_to(doc);
        doc.updated_at = chrono::Utc::now().timestamp();
        Ok(doc.clone())
    }

    async fn delete(&self, author_id: i64, id: i64) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        match docs.get(&id) {
            Some(doc) if doc.author_id == Some(author_id) => {
                docs.remove(&id);
                Ok(())
            }
            _ => Err(Error::NotFound),
        }
    }
}

struct StoredChunk {
    content: String,
    metadata: serde_json::Value,
    vector: Vec<f32>,
}

/// In-memory vector index; embeds through the supplied client.
pub struct MemoryVectorStore {
    embedder: Arc<dyn EmbeddingClient>,
    rows: RwLock<Vec<StoredChunk>>,
}

impl MemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedder,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored chunk rows (test observability).
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add_documents(&self, chunks: Vec<ChunkInsert>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::upstream(format!(
                "embedding client returned {} vectors for {} texts",
                vectors.len(),
                chunks.len()
            )));
        }
        let written = chunks.len();
        let mut rows = self.rows.write().unwrap();
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            rows.push(StoredChunk {
                content: chunk.content,
                metadata: chunk.metadata,
                vector,
            });
        }
        Ok(written)
    }

    async fn delete_by_document_id(&self, doc_id: &str) -> Result<u64> {
        let mut rows = self.rows.write().unwrap();
        let before = rows.len();
        rows.retain(|row| {
            row.metadata
                .get(META_DOC_ID)
                .and_then(serde_json::Value::as_str)
                != Some(doc_id)
        });
        Ok((before - rows.len()) as u64)
    }

    async fn similarity_search(
        &self,
        query: &str,
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("empty embedding response"))?;

        let rows = self.rows.read().unwrap();
        let mut candidates: Vec<ScoredChunk> = rows
            .iter()
            .filter(|row| filter.matches(&row.metadata))
            .map(|row| {
                let (doc_id, chunk_index) = chunk_identity(&row.metadata);
                ScoredChunk {
                    content: row.content.clone(),
                    metadata: row.metadata.clone(),
                    score: cosine_similarity(&query_vec, &row.vector) as f64,
                    doc_id,
                    chunk_index,
                }
            })
            .collect();

        rank_candidates(&mut candidates);
        candidates.truncate(top_k);
        Ok(candidates)
    }
}
