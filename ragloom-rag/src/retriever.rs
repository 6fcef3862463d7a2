//! Query-time retrieval: embed → filtered search → optional rerank.
//!
//! The metadata filter is applied inside the vector search, so the ranked
//! set is always drawn from the filter-satisfying population. When a query
//! asks for re-ranking, the search is oversampled to
//! `max(k, rerank_pool_size)` candidates, re-scored, and truncated to `k`.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RagConfig;
use crate::document::{Query, RetrievalResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::vectorstore::VectorStore;

/// Turns a [`Query`] into a ranked [`RetrievalResult`].
///
/// Given identical store state, query and filter, `retrieve` returns an
/// identical ordered result, provided the embedding provider is
/// deterministic.
///
/// # Example
///
/// ```rust,ignore
/// let retriever = Retriever::builder()
///     .config(RagConfig::default())
///     .embedding_provider(embedder)
///     .vector_store(store)
///     .reranker(Arc::new(KeywordOverlapReranker::default())) // optional
///     .build()?;
///
/// let result = retriever.retrieve(&Query::new("Explain RAG", 4).with_rerank()).await?;
/// ```
pub struct Retriever {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl Retriever {
    /// Create a new [`RetrieverBuilder`].
    pub fn builder() -> RetrieverBuilder {
        RetrieverBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// A query for the configured default `top_k`.
    pub fn query(&self, text: impl Into<String>) -> Query {
        Query::new(text, self.config.top_k)
    }

    /// Retrieve the chunks most relevant to `query`.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`, or re-ranking is requested without a reranker
    /// - [`RagError::DimensionError`] if the query vector does not match the store
    /// - embedding, store, or reranker errors from the collaborators
    pub async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        if query.k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        let reranker = match (query.rerank, &self.reranker) {
            (false, _) => None,
            (true, Some(reranker)) => Some(reranker),
            (true, None) => {
                return Err(RagError::ConfigError(
                    "re-ranking requested but no reranker is configured".to_string(),
                ));
            }
        };

        // 1. Embed the query
        let query_vector = self.embedding_provider.embed(&query.text).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            e
        })?;

        // 2. Filtered search, oversampled when re-ranking
        let pool = if reranker.is_some() {
            query.k.max(self.config.rerank_pool_size)
        } else {
            query.k
        };
        let candidates =
            self.vector_store.search(&query_vector, pool, query.filter.as_ref()).await.map_err(
                |e| {
                    error!(error = %e, "vector store search failed");
                    e
                },
            )?;
        debug!(candidate_count = candidates.len(), pool, "vector search completed");

        // 3. Rerank and truncate
        let mut hits = match reranker {
            Some(reranker) => {
                let reranked = reranker.rerank(&query.text, candidates).await.map_err(|e| {
                    error!(reranker = reranker.name(), error = %e, "reranking failed");
                    e
                })?;
                debug!(reranker = reranker.name(), "reranked candidate pool");
                reranked
            }
            None => candidates,
        };
        hits.truncate(query.k);

        // 4. Optional score threshold
        if let Some(threshold) = self.config.similarity_threshold {
            hits.retain(|hit| hit.score >= threshold);
        }

        info!(result_count = hits.len(), k = query.k, rerank = query.rerank, "retrieval completed");
        Ok(RetrievalResult::new(hits))
    }
}

/// Builder for constructing a [`Retriever`].
///
/// All fields except `reranker` are required; `config` defaults to
/// [`RagConfig::default()`].
#[derive(Default)]
pub struct RetrieverBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RetrieverBuilder {
    /// Set the retrieval configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

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

    /// Set an optional reranker used by queries that request re-ranking.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`Retriever`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or the
    /// config is invalid.
    pub fn build(self) -> Result<Retriever> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        Ok(Retriever { config, embedding_provider, vector_store, reranker: self.reranker })
    }
}
