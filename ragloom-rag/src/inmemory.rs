//! In-memory vector store with exact k-nearest search.
//!
//! This module provides [`InMemoryVectorStore`], a dependency-free vector store
//! backed by a `HashMap` protected by a `tokio::sync::RwLock`. Entries are
//! held behind `Arc` and swapped whole, so readers never see a partially
//! replaced vector. The store can be written to and restored from a JSON
//! snapshot.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};
use crate::filter::MetadataFilter;
use crate::vectorstore::{DistanceMetric, VectorStore};

/// An in-memory vector store ranking by a fixed [`DistanceMetric`].
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_rag::{DistanceMetric, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new(384, DistanceMetric::Cosine);
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    metric: DistanceMetric,
    entries: RwLock<HashMap<String, Arc<IndexEntry>>>,
}

/// Durable layout written by [`InMemoryVectorStore::save`].
#[derive(Debug, Serialize, Deserialize)]
struct StoreSnapshot {
    dimensions: usize,
    metric: DistanceMetric,
    entries: Vec<IndexEntry>,
}

impl InMemoryVectorStore {
    /// Create a new empty store for vectors of `dimensions` components.
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self { dimensions, metric, entries: RwLock::new(HashMap::new()) }
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(RagError::DimensionError {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Write all entries to `path` as a JSON snapshot.
    ///
    /// The snapshot is written to `<path>.tmp` and renamed over `path`, so an
    /// interrupted save leaves the previous snapshot intact.
    ///
    /// Entries are sorted by chunk id so identical stores produce identical files.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = {
            let entries = self.entries.read().await;
            let mut sorted: Vec<IndexEntry> = entries.values().map(|e| (**e).clone()).collect();
            sorted.sort_by(|a, b| a.chunk.id.cmp(&b.chunk.id));
            let snapshot =
                StoreSnapshot { dimensions: self.dimensions, metric: self.metric, entries: sorted };
            serde_json::to_vec(&snapshot).map_err(|e| {
                error!(error = %e, "failed to serialize store snapshot");
                RagError::PersistenceError(format!("failed to serialize snapshot: {e}"))
            })?
        };
        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, bytes).await.map_err(|e| {
            error!(path = %staging.display(), error = %e, "failed to write store snapshot");
            RagError::PersistenceError(format!("failed to write '{}': {e}", staging.display()))
        })?;
        tokio::fs::rename(&staging, path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to move store snapshot into place");
            RagError::PersistenceError(format!("failed to replace '{}': {e}", path.display()))
        })?;
        info!(path = %path.display(), "saved vector store snapshot");
        Ok(())
    }

    /// Restore a store from a snapshot written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if the file cannot be read or
    /// parsed, and [`RagError::DimensionError`] if any entry disagrees with
    /// the recorded dimension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            RagError::PersistenceError(format!("failed to read '{}': {e}", path.display()))
        })?;
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            RagError::PersistenceError(format!("failed to parse '{}': {e}", path.display()))
        })?;

        let store = Self::new(snapshot.dimensions, snapshot.metric);
        let mut map = HashMap::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            store.check_dimensions(&entry.vector)?;
            map.insert(entry.chunk.id.clone(), Arc::new(entry));
        }
        let count = map.len();
        *store.entries.write().await = map;
        info!(path = %path.display(), entry_count = count, "loaded vector store snapshot");
        Ok(store)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn upsert(&self, entry: IndexEntry) -> Result<()> {
        self.check_dimensions(&entry.vector)?;
        let mut entries = self.entries.write().await;
        entries.insert(entry.chunk.id.clone(), Arc::new(entry));
        Ok(())
    }

    async fn upsert_batch(&self, batch: Vec<IndexEntry>) -> Result<()> {
        for entry in &batch {
            self.check_dimensions(&entry.vector)?;
        }
        let mut entries = self.entries.write().await;
        for entry in batch {
            entries.insert(entry.chunk.id.clone(), Arc::new(entry));
        }
        Ok(())
    }

    async fn delete(&self, chunk_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(chunk_id).is_some())
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.chunk.document_id != document_id);
        Ok(before - entries.len())
    }

    async fn document_chunk_ids(&self, document_id: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut ids: Vec<String> = entries
            .values()
            .filter(|entry| entry.chunk.document_id == document_id)
            .map(|entry| entry.chunk.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Swaps the document's entries under one write lock; readers see either
    /// the old set or the new one.
    async fn replace_document(&self, document_id: &str, batch: Vec<IndexEntry>) -> Result<usize> {
        for entry in &batch {
            self.check_dimensions(&entry.vector)?;
        }
        let fresh: HashSet<String> = batch.iter().map(|e| e.chunk.id.clone()).collect();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|id, entry| entry.chunk.document_id != document_id || fresh.contains(id));
        let removed = before - entries.len();
        for entry in batch {
            entries.insert(entry.chunk.id.clone(), Arc::new(entry));
        }
        Ok(removed)
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        self.check_dimensions(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f32, Arc<IndexEntry>)> = {
            let entries = self.entries.read().await;
            entries
                .values()
                .filter(|entry| filter.is_none_or(|f| f.matches(&entry.chunk.metadata)))
                .map(|entry| (self.metric.measure(&entry.vector, query), Arc::clone(entry)))
                .collect()
        };

        let metric = self.metric;
        scored.sort_by(|(ra, a), (rb, b)| {
            metric.closer_first(*ra, *rb).then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);

        debug!(result_count = scored.len(), k, filtered = filter.is_some(), "in-memory search");

        Ok(scored
            .into_iter()
            .map(|(raw, entry)| SearchResult {
                chunk: entry.chunk.clone(),
                score: metric.to_score(raw),
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
