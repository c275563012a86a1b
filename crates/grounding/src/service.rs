//! Contribution service: the public operations over contributed
//! documents, composing the repository, the ingestion pipeline, and the
//! retrieval pipeline with ownership checks.

use serde::Serialize;
use tracing::info;

use grounding_core::models::{Document, DocumentPatch, NewDocument};
use grounding_core::retrieval;
use grounding_core::splitter::SplitterConfig;
use grounding_core::store::{ChunkFilter, DocumentRepository, ScoredChunk, VectorStore};
use grounding_core::{Error, Result};

use crate::ingest::{self, IngestMode};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Outcome of an ingestion: the document id and how many chunks were
/// written for it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IngestReceipt {
    pub id: i64,
    pub chunks: usize,
}

/// One page of a cursor-based listing. `next_cursor` is the last
/// returned id when the page was full, `None` at the end of the data.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Document>,
    pub next_cursor: Option<i64>,
}

pub struct ContributionService<R, V> {
    repo: R,
    vectors: V,
    splitter: SplitterConfig,
}

impl<R, V> ContributionService<R, V>
where
    R: DocumentRepository,
    V: VectorStore,
{
    pub fn new(repo: R, vectors: V, splitter: SplitterConfig) -> Self {
        Self {
            repo,
            vectors,
            splitter,
        }
    }

    /// Persist a new contribution and index it. The text commit is
    /// authoritative: if embedding or storage fails afterwards the
    /// document exists unindexed and the error propagates for a retry.
    pub async fn create(&self, payload: NewDocument) -> Result<IngestReceipt> {
        if payload.text.trim().is_empty() {
            return Err(Error::validation("text must not be empty"));
        }

        let doc = self.repo.insert(payload).await?;
        let chunks = ingest::run(&self.vectors, &doc, &self.splitter, IngestMode::Create).await?;
        info!(doc_id = doc.id, chunks, "created contribution");
        Ok(IngestReceipt { id: doc.id, chunks })
    }

    /// List `author_id`'s documents after `cursor`, ordered by
    /// ascending id. `limit` is clamped to `[1, 100]`, defaulting to 20.
    pub async fn list(
        &self,
        author_id: i64,
        limit: Option<i64>,
        cursor: Option<i64>,
    ) -> Result<Page> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let items = self.repo.list(author_id, limit, cursor).await?;
        let next_cursor = if items.len() as i64 == limit {
            items.last().map(|doc| doc.id)
        } else {
            None
        };
        Ok(Page { items, next_cursor })
    }

    pub async fn get(&self, author_id: i64, id: i64) -> Result<Document> {
        self.repo.get(author_id, id).await
    }

    /// Merge `patch` into the stored document, then re-index: stale
    /// chunks are deleted before the new generation is written, so
    /// repeating an update with identical text never accumulates
    /// duplicates.
    pub async fn update(
        &self,
        author_id: i64,
        id: i64,
        patch: DocumentPatch,
    ) -> Result<IngestReceipt> {
        if let Some(text) = &patch.text {
            if text.trim().is_empty() {
                return Err(Error::validation("text must not be empty"));
            }
        }

        let doc = self.repo.update(author_id, id, patch).await?;
        let chunks = ingest::run(&self.vectors, &doc, &self.splitter, IngestMode::Update).await?;
        info!(doc_id = doc.id, chunks, "updated contribution");
        Ok(IngestReceipt { id: doc.id, chunks })
    }

    /// De-index then delete. Vector removal runs first: if it fails the
    /// document row survives and the delete can be retried; the reverse
    /// order could strand chunks with no owning document to clean them
    /// up through.
    pub async fn delete(&self, author_id: i64, id: i64) -> Result<i64> {
        let doc = self.repo.get(author_id, id).await?;
        ingest::deindex(&self.vectors, doc.id).await?;
        self.repo.delete(author_id, id).await?;
        info!(doc_id = doc.id, "deleted contribution");
        Ok(doc.id)
    }

    /// Metadata-filtered similarity search for the generation workflow.
    /// `top_k = 0` is the opt-out fast path: no embedding call, empty
    /// context.
    pub async fn retrieve(
        &self,
        terms: &[String],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>> {
        retrieval::retrieve(&self.vectors, terms, top_k, filter).await
    }
}
