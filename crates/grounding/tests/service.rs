//! End-to-end service tests against a throwaway SQLite database and a
//! deterministic in-process embedding client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use grounding::db;
use grounding::migrate;
use grounding::service::ContributionService;
use grounding::sqlite_store::{SqliteDocumentRepository, SqliteVectorStore};

use grounding_core::embedding::EmbeddingClient;
use grounding_core::models::{ContentKind, DocumentPatch, Language, NewDocument};
use grounding_core::splitter::SplitterConfig;
use grounding_core::store::ChunkFilter;
use grounding_core::{Error, Result};

/// Deterministic embedder: buckets text bytes into a fixed-width
/// vector, so identical texts embed identically and every call is
/// observable through the counter.
struct MockEmbeddings {
    calls: AtomicUsize,
}

impl MockEmbeddings {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddings {
    fn model_name(&self) -> &str {
        "mock"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| {
                let mut acc = [1.0f32; 8];
                for (i, byte) in text.bytes().enumerate() {
                    acc[i % 8] += byte as f32;
                }
                acc.to_vec()
            })
            .collect())
    }
}

type Service = ContributionService<SqliteDocumentRepository, SqliteVectorStore>;

async fn setup() -> (TempDir, Service, SqlitePool, Arc<MockEmbeddings>) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("gnd.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    let embedder = Arc::new(MockEmbeddings::new());
    let repo = SqliteDocumentRepository::new(pool.clone());
    let vectors = SqliteVectorStore::new(pool.clone(), embedder.clone());
    let service = ContributionService::new(repo, vectors, SplitterConfig::default());
    (tmp, service, pool, embedder)
}

async fn chunk_count(pool: &SqlitePool, doc_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE json_extract(metadata, '$.doc_id') = ?")
        .bind(doc_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}

fn payload(text: impl Into<String>, author: i64) -> NewDocument {
    NewDocument::new(text, ContentKind::Doc).with_author_id(author)
}

#[tokio::test]
async fn create_splits_long_text_and_attaches_metadata() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service
        .create(payload("A".repeat(1200), 1).with_domain_key("health"))
        .await
        .unwrap();
    assert_eq!(receipt.chunks, 2);
    assert_eq!(chunk_count(&pool, receipt.id).await, 2);

    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT metadata FROM chunks WHERE json_extract(metadata, '$.doc_id') = ? ORDER BY id",
    )
    .bind(receipt.id.to_string())
    .fetch_all(&pool)
    .await
    .unwrap();

    for (index, raw) in rows.iter().enumerate() {
        let metadata: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(metadata["doc_id"], serde_json::json!(receipt.id.to_string()));
        assert_eq!(metadata["chunk_index"], serde_json::json!(index));
        assert_eq!(metadata["type"], serde_json::json!("doc"));
        assert_eq!(metadata["domain_key"], serde_json::json!("health"));
        assert_eq!(metadata["author_id"], serde_json::json!("1"));
        assert_eq!(metadata["source"], serde_json::json!("contribution"));
        assert_eq!(metadata["visibility"], serde_json::json!("private"));
    }
}

#[tokio::test]
async fn update_replaces_the_prior_chunk_generation() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service.create(payload("A".repeat(1200), 1)).await.unwrap();
    assert_eq!(chunk_count(&pool, receipt.id).await, 2);

    let patch = DocumentPatch {
        text: Some("B".repeat(10)),
        ..Default::default()
    };
    let updated = service.update(1, receipt.id, patch).await.unwrap();
    assert_eq!(updated.chunks, 1);
    // one chunk total, not three: the old generation is gone
    assert_eq!(chunk_count(&pool, receipt.id).await, 1);
}

#[tokio::test]
async fn reingesting_identical_text_is_idempotent() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service.create(payload("A".repeat(1200), 1)).await.unwrap();
    let before = chunk_count(&pool, receipt.id).await;

    for _ in 0..2 {
        let patch = DocumentPatch {
            text: Some("A".repeat(1200)),
            ..Default::default()
        };
        service.update(1, receipt.id, patch).await.unwrap();
        assert_eq!(chunk_count(&pool, receipt.id).await, before);
    }
}

#[tokio::test]
async fn delete_removes_every_chunk_and_the_document() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service.create(payload("A".repeat(1200), 1)).await.unwrap();
    assert_eq!(chunk_count(&pool, receipt.id).await, 2);

    service.delete(1, receipt.id).await.unwrap();
    assert_eq!(chunk_count(&pool, receipt.id).await, 0);
    assert!(matches!(
        service.get(1, receipt.id).await,
        Err(Error::NotFound)
    ));
}

#[tokio::test]
async fn other_authors_cannot_see_or_touch_a_document() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service.create(payload("owned text", 1)).await.unwrap();

    assert!(matches!(
        service.get(2, receipt.id).await,
        Err(Error::NotFound)
    ));
    let patch = DocumentPatch {
        text: Some("hijacked".into()),
        ..Default::default()
    };
    assert!(matches!(
        service.update(2, receipt.id, patch).await,
        Err(Error::NotFound)
    ));
    assert!(matches!(
        service.delete(2, receipt.id).await,
        Err(Error::NotFound)
    ));

    // and the failed delete removed nothing
    assert_eq!(chunk_count(&pool, receipt.id).await, 1);
    assert!(service.get(1, receipt.id).await.is_ok());
}

#[tokio::test]
async fn filters_restrict_retrieval_to_matching_metadata() {
    let (_tmp, service, _pool, _embedder) = setup().await;

    service
        .create(
            payload("sleep and recovery notes", 1)
                .with_domain_key("health")
                .with_language(Language::En),
        )
        .await
        .unwrap();
    service
        .create(
            payload("quarterly budget notes", 1)
                .with_domain_key("finance")
                .with_language(Language::En),
        )
        .await
        .unwrap();

    let filter = ChunkFilter {
        domain_key: Some("health".into()),
        ..Default::default()
    };
    let results = service
        .retrieve(&["notes".to_string()], 10, &filter)
        .await
        .unwrap();

    assert!(!results.is_empty());
    for chunk in &results {
        assert_eq!(chunk.metadata["domain_key"], serde_json::json!("health"));
    }
}

#[tokio::test]
async fn top_k_zero_returns_empty_without_embedding() {
    let (_tmp, service, _pool, embedder) = setup().await;

    service.create(payload("some grounding text", 1)).await.unwrap();
    let calls_before = embedder.call_count();

    let results = service
        .retrieve(
            &["some".to_string(), "grounding".to_string()],
            0,
            &ChunkFilter::default(),
        )
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(embedder.call_count(), calls_before);
}

#[tokio::test]
async fn pagination_chains_to_completion_without_gaps() {
    let (_tmp, service, _pool, _embedder) = setup().await;

    let mut created = Vec::new();
    for i in 0..5 {
        let receipt = service
            .create(payload(format!("document number {i}"), 1))
            .await
            .unwrap();
        created.push(receipt.id);
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = service.list(1, Some(2), cursor).await.unwrap();
        seen.extend(page.items.iter().map(|doc| doc.id));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(seen, created);

    // limits are clamped to at least one row
    let clamped = service.list(1, Some(0), None).await.unwrap();
    assert_eq!(clamped.items.len(), 1);
}

#[tokio::test]
async fn empty_text_is_rejected_before_persistence() {
    let (_tmp, service, pool, embedder) = setup().await;

    let err = service.create(payload("   \n ", 1)).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(docs, 0);
    assert_eq!(embedder.call_count(), 0);
}

#[tokio::test]
async fn anonymous_contributions_index_but_cannot_be_managed() {
    let (_tmp, service, pool, _embedder) = setup().await;

    let receipt = service
        .create(NewDocument::new("anonymous wisdom", ContentKind::Doc))
        .await
        .unwrap();
    assert_eq!(chunk_count(&pool, receipt.id).await, 1);

    // management operations scope by author, so nobody lists or owns it
    let page = service.list(1, None, None).await.unwrap();
    assert!(page.items.is_empty());
    assert!(matches!(
        service.get(1, receipt.id).await,
        Err(Error::NotFound)
    ));

    // but similarity search still reaches it
    let results = service
        .retrieve(&["anonymous".to_string()], 5, &ChunkFilter::default())
        .await
        .unwrap();
    assert!(results.iter().any(|c| c.doc_id == receipt.id.to_string()));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect(&tmp.path().join("gnd.sqlite")).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
}
