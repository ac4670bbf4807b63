use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema if it does not exist. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            title TEXT,
            text_content TEXT NOT NULL DEFAULT '',
            analysis_json TEXT,
            uploaded_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Content-addressed analysis cache
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_cache (
            file_hash TEXT PRIMARY KEY,
            result_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_owner_uploaded ON documents(owner, uploaded_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
