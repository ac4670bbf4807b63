//! Document store and analysis cache queries.
//!
//! All operations take a shared [`SqlitePool`]. Document reads are
//! owner-scoped; analysis writes touch only the `analysis_json` column so
//! concurrent unrelated updates are not clobbered.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{AnalysisResult, Document};

/// Insert a new document with freshly extracted text.
pub async fn insert_document(
    pool: &SqlitePool,
    owner: &str,
    title: Option<&str>,
    text_content: &str,
) -> Result<Document> {
    let id = Uuid::new_v4().to_string();
    let uploaded_at = chrono::Utc::now();

    sqlx::query(
        "INSERT INTO documents (id, owner, title, text_content, uploaded_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner)
    .bind(title)
    .bind(text_content)
    .bind(uploaded_at.timestamp())
    .execute(pool)
    .await?;

    Ok(Document {
        id,
        owner: owner.to_string(),
        title: title.map(str::to_string),
        text_content: text_content.to_string(),
        analysis: None,
        uploaded_at,
    })
}

/// Fetch a document by id, scoped to its owner.
pub async fn get_document(pool: &SqlitePool, id: &str, owner: &str) -> Result<Option<Document>> {
    let row = sqlx::query(
        "SELECT id, owner, title, text_content, analysis_json, uploaded_at FROM documents WHERE id = ? AND owner = ?",
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| document_from_row(&r)))
}

/// Most recent other document by the same owner, or `None`.
///
/// Ordered by upload time descending with an id tie-break so the choice
/// is deterministic. Deliberately filename-agnostic.
pub async fn find_previous(
    pool: &SqlitePool,
    owner: &str,
    exclude_id: &str,
) -> Result<Option<Document>> {
    let row = sqlx::query(
        r#"
        SELECT id, owner, title, text_content, analysis_json, uploaded_at
        FROM documents
        WHERE owner = ? AND id != ?
        ORDER BY uploaded_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(owner)
    .bind(exclude_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| document_from_row(&r)))
}

/// Attach an analysis result to a document. Partial-field write: only
/// `analysis_json` is updated.
pub async fn save_analysis(
    pool: &SqlitePool,
    document_id: &str,
    result: &AnalysisResult,
) -> Result<()> {
    let json = serde_json::to_string(result).context("Failed to serialize analysis result")?;

    sqlx::query("UPDATE documents SET analysis_json = ? WHERE id = ?")
        .bind(&json)
        .bind(document_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Look up a cached result by fingerprint.
///
/// A stored row that fails to deserialize is an `Err`, not a silent miss;
/// the pipeline logs it before degrading to recomputation.
pub async fn cache_lookup(pool: &SqlitePool, file_hash: &str) -> Result<Option<AnalysisResult>> {
    let row: Option<String> =
        sqlx::query_scalar("SELECT result_json FROM analysis_cache WHERE file_hash = ?")
            .bind(file_hash)
            .fetch_optional(pool)
            .await?;

    match row {
        Some(json) => {
            let result = serde_json::from_str(&json)
                .with_context(|| format!("Corrupt cache entry for {}", file_hash))?;
            Ok(Some(result))
        }
        None => Ok(None),
    }
}

/// Write-through a computed result. Last write wins for a given
/// fingerprint.
pub async fn cache_upsert(
    pool: &SqlitePool,
    file_hash: &str,
    result: &AnalysisResult,
) -> Result<()> {
    let json = serde_json::to_string(result).context("Failed to serialize analysis result")?;
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO analysis_cache (file_hash, result_json, created_at) VALUES (?, ?, ?)
        ON CONFLICT(file_hash) DO UPDATE SET result_json = excluded.result_json
        "#,
    )
    .bind(file_hash)
    .bind(&json)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Cache entries as (fingerprint, created_at epoch), newest first.
pub async fn list_cache_entries(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    let rows = sqlx::query(
        "SELECT file_hash, created_at FROM analysis_cache ORDER BY created_at DESC, file_hash ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| (r.get("file_hash"), r.get("created_at")))
        .collect())
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    let uploaded_at: i64 = row.get("uploaded_at");
    let analysis_json: Option<String> = row.get("analysis_json");

    Document {
        id: row.get("id"),
        owner: row.get("owner"),
        title: row.get("title"),
        text_content: row.get("text_content"),
        // A malformed stored blob surfaces as "no analysis" on read
        analysis: analysis_json.and_then(|j| serde_json::from_str(&j).ok()),
        uploaded_at: chrono::DateTime::from_timestamp(uploaded_at, 0).unwrap_or_default(),
    }
}
