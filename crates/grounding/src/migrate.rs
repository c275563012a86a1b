use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent: every statement is IF NOT EXISTS.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            kind TEXT NOT NULL,
            domain_key TEXT,
            language_key TEXT,
            author_id INTEGER,
            source TEXT,
            extra TEXT NOT NULL DEFAULT '{}',
            visibility TEXT NOT NULL DEFAULT 'private',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            embedding BLOB NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_author_id ON documents(author_id)")
        .execute(pool)
        .await?;

    // chunks reference documents only through the stringified doc_id in
    // their metadata JSON; this expression index keeps stale-chunk
    // deletion from scanning the whole table
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_doc_id ON chunks(json_extract(metadata, '$.doc_id'))",
    )
    .execute(pool)
    .await?;

    Ok(())
}
