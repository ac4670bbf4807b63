//! SQLite connection handling.
//!
//! Contract Lens keeps documents and the analysis cache in a single
//! SQLite file. The pool stays small because the pipeline processes
//! chunks sequentially; WAL mode lets `show`/`cache` reads proceed while
//! an analysis run is writing.

use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::DbConfig;

/// Open the database at the configured path, creating the file and any
/// missing parent directories on first use.
pub async fn connect(db: &DbConfig) -> Result<SqlitePool> {
    if let Some(parent) = db.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db.path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
