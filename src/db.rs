use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// File name of the collection database inside the persist directory.
pub const COLLECTION_FILE: &str = "collection.sqlite";

pub async fn connect(persist_dir: &Path) -> Result<SqlitePool> {
    std::fs::create_dir_all(persist_dir).with_context(|| {
        format!(
            "Failed to create persist directory: {}",
            persist_dir.display()
        )
    })?;

    let db_path = persist_dir.join(COLLECTION_FILE);
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
