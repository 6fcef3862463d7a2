//! Index-time pipeline: chunk → embed → store.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragloom_rag::{Indexer, InMemoryVectorStore, TextChunker, ChunkerConfig, DistanceMetric};
//!
//! let indexer = Indexer::builder()
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new(384, DistanceMetric::Cosine)))
//!     .chunker(Arc::new(TextChunker::new(ChunkerConfig::default())?))
//!     .build()?;
//!
//! indexer.index(&document).await?;
//! ```

use std::sync::Arc;

use tracing::{error, info};

use crate::chunking::Chunker;
use crate::document::{Chunk, Document, IndexEntry};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Splits documents, embeds the chunks, and upserts them into a [`VectorStore`].
///
/// Indexing a document whose id is already present replaces all of its
/// previous chunks. Construct one via [`Indexer::builder()`].
pub struct Indexer {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl Indexer {
    /// Create a new [`IndexerBuilder`].
    pub fn builder() -> IndexerBuilder {
        IndexerBuilder::default()
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Index a single document, replacing any earlier version.
    ///
    /// Returns the chunks that were stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if embedding fails,
    /// [`RagError::DimensionError`] if the provider returns vectors of the
    /// wrong size, or the store's error if the upsert fails.
    pub async fn index(&self, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(document.id = %document.id, error = %e, "embedding failed during indexing");
                e
            })?
        };
        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingError {
                provider: "batch".to_string(),
                message: format!(
                    "expected {} vectors for document '{}', got {}",
                    chunks.len(),
                    document.id,
                    vectors.len()
                ),
            });
        }

        let expected = self.vector_store.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            error!(document.id = %document.id, expected, actual = bad.len(), "embedding dimension mismatch");
            return Err(RagError::DimensionError { expected, actual: bad.len() });
        }

        let entries: Vec<IndexEntry> =
            chunks.iter().cloned().zip(vectors).map(|(c, v)| IndexEntry::new(c, v)).collect();
        let stale = self.vector_store.replace_document(&document.id, entries).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "upsert failed during indexing");
            e
        })?;

        info!(document.id = %document.id, chunk_count = chunks.len(), stale, "indexed document");
        Ok(chunks)
    }

    /// Index multiple documents in order.
    ///
    /// # Errors
    ///
    /// Stops at the first document that fails.
    pub async fn index_batch(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut all_chunks = Vec::new();
        for document in documents {
            all_chunks.extend(self.index(document).await?);
        }
        Ok(all_chunks)
    }

    /// Remove a document and all of its chunks. Returns how many entries were removed.
    pub async fn remove(&self, document_id: &str) -> Result<usize> {
        let removed = self.vector_store.delete_document(document_id).await?;
        info!(document.id = document_id, removed, "removed document");
        Ok(removed)
    }
}

/// Builder for constructing an [`Indexer`]. All fields are required.
#[derive(Default)]
pub struct IndexerBuilder {
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl IndexerBuilder {
    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`Indexer`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a field is missing or the provider
    /// and store disagree on dimensionality.
    pub fn build(self) -> Result<Indexer> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::ConfigError("chunker is required".to_string()))?;

        if embedding_provider.dimensions() != vector_store.dimensions() {
            return Err(RagError::ConfigError(format!(
                "embedding provider produces {} dimensions but the store expects {}",
                embedding_provider.dimensions(),
                vector_store.dimensions()
            )));
        }

        Ok(Indexer { embedding_provider, vector_store, chunker })
    }
}
