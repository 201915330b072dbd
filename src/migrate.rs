use anyhow::Result;
use sqlx::SqlitePool;

/// Create the collection schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // `seq` preserves insertion order for tie-breaking equal scores.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            source TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            model TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_doc_type ON entries(doc_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source)")
        .execute(pool)
        .await?;

    Ok(())
}
