//! Similarity index backends.
//!
//! The [`VectorIndex`] trait is the seam between the vector store manager
//! and the collection that actually holds embedded chunks. Two backends
//! are provided:
//!
//! - [`SqliteIndex`]: persisted collection in `<persist_dir>/collection.sqlite`.
//! - [`InMemoryIndex`]: process-local collection for tests and throwaway
//!   sessions.
//!
//! Both rank by brute-force cosine similarity. Equal scores keep
//! insertion order. Metadata filters are applied before ranking.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::sync::RwLock;
use uuid::Uuid;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{Document, Metadata, MetadataFilter, ScoredDocument};

/// A collection of embedded documents that supports similarity search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Drop every entry, leaving an empty collection.
    async fn reset(&self) -> Result<()>;

    /// Append documents with their embeddings. `vectors[i]` belongs to
    /// `documents[i]`.
    async fn insert(&self, documents: &[Document], vectors: &[Vec<f32>], model: &str)
        -> Result<()>;

    /// Return up to `k` documents most similar to `query_vec`, restricted to
    /// entries whose metadata matches `filter`.
    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize>;
}

/// Open the backend named by `backend` (`"sqlite"` or `"memory"`).
pub async fn open_index(backend: &str, persist_dir: &Path) -> Result<Box<dyn VectorIndex>> {
    match backend {
        "sqlite" => Ok(Box::new(SqliteIndex::open(persist_dir).await?)),
        "memory" => Ok(Box::new(InMemoryIndex::new())),
        other => anyhow::bail!("Unknown vector_store.backend: {}", other),
    }
}

fn rank(mut scored: Vec<ScoredDocument>, k: usize) -> Vec<ScoredDocument> {
    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(k);
    scored
}

// ============ SQLite ============

/// Persisted collection backed by SQLite.
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open (creating if needed) the collection under `persist_dir`.
    pub async fn open(persist_dir: &Path) -> Result<Self> {
        let pool = db::connect(persist_dir).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn reset(&self) -> Result<()> {
        sqlx::query("DELETE FROM entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert(
        &self,
        documents: &[Document],
        vectors: &[Vec<f32>],
        model: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (doc, vector) in documents.iter().zip(vectors.iter()) {
            let metadata_json = serde_json::to_string(&doc.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO entries (id, source, doc_type, content, metadata_json, embedding, model)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&doc.metadata.source)
            .bind(doc.metadata.doc_type.as_str())
            .bind(&doc.content)
            .bind(&metadata_json)
            .bind(vec_to_blob(vector))
            .bind(model)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let type_filter = filter.and_then(|f| f.get("type")).map(String::as_str);
        let source_filter = filter.and_then(|f| f.get("source")).map(String::as_str);

        let rows = sqlx::query(
            r#"
            SELECT content, metadata_json, embedding
            FROM entries
            WHERE (?1 IS NULL OR doc_type = ?1)
              AND (?2 IS NULL OR source = ?2)
            ORDER BY seq
            "#,
        )
        .bind(type_filter)
        .bind(source_filter)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata = serde_json::from_str(&metadata_json)
                .with_context(|| "Corrupt metadata in collection")?;
            if let Some(f) = filter {
                if !metadata.matches(f) {
                    continue;
                }
            }
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(query_vec, &blob_to_vec(&blob));
            scored.push(ScoredDocument {
                document: Document::new(row.get::<String, _>("content"), metadata),
                score,
            });
        }

        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

// ============ In-memory ============

struct StoredEntry {
    document: Document,
    vector: Vec<f32>,
}

/// Process-local collection guarded by a `RwLock`.
pub struct InMemoryIndex {
    entries: RwLock<Vec<StoredEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn reset(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn insert(
        &self,
        documents: &[Document],
        vectors: &[Vec<f32>],
        _model: &str,
    ) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        for (doc, vector) in documents.iter().zip(vectors.iter()) {
            entries.push(StoredEntry {
                document: doc.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vec: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredDocument>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let scored = entries
            .iter()
            .filter(|e| filter.map_or(true, |f| e.document.metadata.matches(f)))
            .map(|e| ScoredDocument {
                document: e.document.clone(),
                score: cosine_similarity(query_vec, &e.vector),
            })
            .collect();
        Ok(rank(scored, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }
}
