//! Vector store manager.
//!
//! Owns one embedding provider and one [`VectorIndex`] collection and
//! tracks whether the collection has been initialized in this process.
//! A collection left on disk by an earlier run is not considered
//! initialized until [`initialize`](VectorStoreManager::initialize) or
//! [`add`](VectorStoreManager::add) is called.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::{create_provider, Embedder};
use crate::error::StoreError;
use crate::index::{open_index, VectorIndex};
use crate::models::{Document, MetadataFilter};

/// Default number of documents returned by [`VectorStoreManager::search`].
pub const DEFAULT_K: usize = 5;

pub struct VectorStoreManager {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
    k: usize,
    initialized: bool,
}

impl VectorStoreManager {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            batch_size: 64,
            k: DEFAULT_K,
            initialized: false,
        }
    }

    /// Build the embedding provider and open the configured collection.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(create_provider(&config.embedding)?);
        let index: Arc<dyn VectorIndex> = Arc::from(
            open_index(
                &config.vector_store.backend,
                &config.vector_store.persist_dir,
            )
            .await?,
        );
        Ok(Self::new(embedder, index)
            .with_batch_size(config.embedding.batch_size)
            .with_k(config.vector_store.k))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of entries in the underlying collection.
    pub async fn count(&self) -> Result<usize> {
        self.index.count().await
    }

    /// Embed `documents` and replace the collection with them.
    ///
    /// Embedding happens before the collection is cleared, so a provider
    /// failure leaves the previous contents untouched.
    pub async fn initialize(&mut self, documents: &[Document]) -> Result<()> {
        let vectors = self.embed_documents(documents).await?;
        self.index.reset().await?;
        self.index
            .insert(documents, &vectors, self.embedder.model_name())
            .await?;
        self.initialized = true;
        info!(documents = documents.len(), "vector store initialized");
        Ok(())
    }

    /// Embed and append `documents`; behaves like [`initialize`](Self::initialize)
    /// when nothing has been indexed yet.
    pub async fn add(&mut self, documents: &[Document]) -> Result<()> {
        if !self.initialized {
            return self.initialize(documents).await;
        }
        let vectors = self.embed_documents(documents).await?;
        self.index
            .insert(documents, &vectors, self.embedder.model_name())
            .await?;
        info!(documents = documents.len(), "documents added to vector store");
        Ok(())
    }

    /// Return the `k` documents most similar to `query`.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] when called before any indexing.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<Document>> {
        if !self.initialized {
            return Err(StoreError::NotInitialized.into());
        }
        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&query_vec, k, filter).await?;
        debug!(hits = hits.len(), k, "similarity search");
        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }

    /// Search with the configured `k` and render the hits as a context block.
    pub async fn assemble_context(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<String> {
        let documents = self.search(query, self.k, filter).await?;
        Ok(format_context(&documents))
    }

    async fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self.embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(StoreError::EmbeddingCount {
                    expected: batch.len(),
                    got: embedded.len(),
                }
                .into());
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

/// Render documents as `Source:` / `Type:` labelled blocks separated by
/// blank lines, preserving order.
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|doc| {
            format!(
                "Source: {}\nType: {}\n{}",
                doc.metadata.source, doc.metadata.doc_type, doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
