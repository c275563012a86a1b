//! Ingestion pipeline: the ordered stages that keep the chunk index
//! consistent with the system-of-record text.
//!
//! The document row is always committed before any vector work starts,
//! and on the update path every stale chunk is deleted before a new
//! generation is written. The worst a mid-pipeline failure can produce
//! is a document with missing chunks (degraded search, never corrupted
//! or duplicated text), and re-running the same update repairs it.

use tracing::{debug, warn};

use grounding_core::metadata::chunk_metadata;
use grounding_core::models::Document;
use grounding_core::splitter::{split_text, SplitterConfig};
use grounding_core::store::{ChunkInsert, VectorStore};
use grounding_core::Result;

/// Whether a prior chunk generation may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Fresh document; nothing to de-index first.
    Create,
    /// Re-ingestion after an edit: stale chunks are removed before the
    /// new generation is written, so old and new never coexist.
    Update,
}

/// Index `doc`: (on update) drop stale chunks, split the text, attach
/// metadata, embed, and store. Returns the number of chunks written.
pub async fn run<V>(
    vectors: &V,
    doc: &Document,
    splitter: &SplitterConfig,
    mode: IngestMode,
) -> Result<usize>
where
    V: VectorStore + ?Sized,
{
    if mode == IngestMode::Update {
        let removed = vectors.delete_by_document_id(&doc.id.to_string()).await?;
        debug!(doc_id = doc.id, removed, "removed stale chunks");
    }

    let segments = split_text(&doc.text, splitter);
    let inserts: Vec<ChunkInsert> = segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| ChunkInsert {
            content: segment.text,
            metadata: chunk_metadata(doc, index),
        })
        .collect();

    let written = match vectors.add_documents(inserts).await {
        Ok(written) => written,
        Err(err) => {
            // the text commit stands; the index is stale until the
            // caller retries the same update
            warn!(doc_id = doc.id, error = %err, "document committed but not indexed");
            return Err(err);
        }
    };

    debug!(doc_id = doc.id, chunks = written, "indexed document");
    Ok(written)
}

/// Remove every chunk belonging to `doc_id`. Used by the delete path
/// before the document row itself is removed, so a failure here aborts
/// the delete instead of orphaning unreachable chunks.
pub async fn deindex<V>(vectors: &V, doc_id: i64) -> Result<u64>
where
    V: VectorStore + ?Sized,
{
    vectors.delete_by_document_id(&doc_id.to_string()).await
}
