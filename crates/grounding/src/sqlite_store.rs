//! SQLite implementations of the storage traits.
//!
//! Documents live in a conventional table keyed by an autoincrement id.
//! Chunk rows hold the embedding BLOB (little-endian f32), the chunk
//! text, and the denormalized metadata JSON; their only link to the
//! owning document is the stringified `doc_id` inside that JSON, which
//! both deletion and filtering compare as a string.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use grounding_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingClient};
use grounding_core::models::{
    ContentKind, Document, DocumentPatch, ExtraMap, Language, NewDocument, Visibility,
};
use grounding_core::retrieval::rank_candidates;
use grounding_core::store::{
    chunk_identity, ChunkFilter, ChunkInsert, DocumentRepository, ScoredChunk, VectorStore,
};
use grounding_core::{Error, Result};

/// Vector index over the `chunks` table; embeds through the supplied
/// client and ranks with brute-force cosine similarity in process.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn EmbeddingClient>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { pool, embedder }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
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

        let mut tx = self.pool.begin().await.map_err(Error::storage)?;
        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query("INSERT INTO chunks (embedding, content, metadata) VALUES (?, ?, ?)")
                .bind(vec_to_blob(vector))
                .bind(&chunk.content)
                .bind(chunk.metadata.to_string())
                .execute(&mut *tx)
                .await
                .map_err(Error::storage)?;
        }
        tx.commit().await.map_err(Error::storage)?;

        Ok(chunks.len())
    }

    async fn delete_by_document_id(&self, doc_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chunks WHERE json_extract(metadata, '$.doc_id') = ?")
            .bind(doc_id)
            .execute(&self.pool)
            .await
            .map_err(Error::storage)?;
        Ok(result.rows_affected())
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

        let rows = sqlx::query("SELECT content, metadata, embedding FROM chunks")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::storage)?;

        let mut candidates = Vec::new();
        for row in &rows {
            let metadata_json: String = row.get("metadata");
            let metadata: serde_json::Value =
                serde_json::from_str(&metadata_json).unwrap_or(serde_json::Value::Null);
            if !filter.matches(&metadata) {
                continue;
            }

            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
            let (doc_id, chunk_index) = chunk_identity(&metadata);
            candidates.push(ScoredChunk {
                content: row.get("content"),
                metadata,
                score,
                doc_id,
                chunk_index,
            });
        }

        rank_candidates(&mut candidates);
        candidates.truncate(top_k);
        Ok(candidates)
    }
}

/// System-of-record repository over the `documents` table.
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let kind: String = row.get("kind");
    let language: Option<String> = row.get("language_key");
    let visibility: String = row.get("visibility");
    let extra_json: String = row.get("extra");

    let extra: ExtraMap = serde_json::from_str(&extra_json).map_err(Error::storage)?;

    Ok(Document {
        id: row.get("id"),
        text: row.get("text"),
        kind: ContentKind::from_str(&kind).map_err(Error::storage)?,
        domain_key: row.get("domain_key"),
        language: language
            .map(|l| Language::from_str(&l).map_err(Error::storage))
            .transpose()?,
        author_id: row.get("author_id"),
        source: row.get("source"),
        extra,
        visibility: Visibility::from_str(&visibility).map_err(Error::storage)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn insert(&self, doc: NewDocument) -> Result<Document> {
        let now = chrono::Utc::now().timestamp();
        let extra_json = serde_json::to_string(&doc.extra).map_err(Error::storage)?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents
                (text, kind, domain_key, language_key, author_id, source, extra, visibility,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.text)
        .bind(doc.kind.as_str())
        .bind(&doc.domain_key)
        .bind(doc.language.map(|l| l.as_str()))
        .bind(doc.author_id)
        .bind(&doc.source)
        .bind(&extra_json)
        .bind(doc.visibility.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;

        Ok(Document {
            id: result.last_insert_rowid(),
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
        })
    }

    async fn get(&self, author_id: i64, id: i64) -> Result<Document> {
        let row = sqlx::query("SELECT * FROM documents WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::storage)?;

        match row {
            Some(row) => row_to_document(&row),
            None => Err(Error::NotFound),
        }
    }

    async fn list(
        &self,
        author_id: i64,
        limit: i64,
        after_id: Option<i64>,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT * FROM documents WHERE author_id = ? AND id > ? ORDER BY id ASC LIMIT ?",
        )
        .bind(author_id)
        .bind(after_id.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::storage)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn update(&self, author_id: i64, id: i64, patch: DocumentPatch) -> Result<Document> {
        let mut doc = self.get(author_id, id).await?;
        patch.apply_to(&mut doc);
        doc.updated_at = chrono::Utc::now().timestamp();

        let extra_json = serde_json::to_string(&doc.extra).map_err(Error::storage)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET text = ?, kind = ?, domain_key = ?, language_key = ?, source = ?, extra = ?,
                visibility = ?, updated_at = ?
            WHERE id = ? AND author_id = ?
            "#,
        )
        .bind(&doc.text)
        .bind(doc.kind.as_str())
        .bind(&doc.domain_key)
        .bind(doc.language.map(|l| l.as_str()))
        .bind(&doc.source)
        .bind(&extra_json)
        .bind(doc.visibility.as_str())
        .bind(doc.updated_at)
        .bind(id)
        .bind(author_id)
        .execute(&self.pool)
        .await
        .map_err(Error::storage)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(doc)
    }

    async fn delete(&self, author_id: i64, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(Error::storage)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}
