//! Vector store trait for storing and searching chunk vectors.

use std::cmp::Ordering;
use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{IndexEntry, SearchResult};
use crate::error::Result;
use crate::filter::MetadataFilter;

/// The distance metric a store ranks by. Fixed per store instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity; higher is closer.
    #[default]
    Cosine,
    /// Euclidean distance; lower is closer.
    L2,
}

impl DistanceMetric {
    /// Raw metric value between two vectors of equal length.
    ///
    /// Cosine returns 0.0 if either vector has zero magnitude.
    pub fn measure(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => {
                let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a * norm_b)
            }
            Self::L2 => a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt(),
        }
    }

    /// Order raw values so the closest comes first.
    pub fn closer_first(self, a: f32, b: f32) -> Ordering {
        match self {
            Self::Cosine => b.total_cmp(&a),
            Self::L2 => a.total_cmp(&b),
        }
    }

    /// Map a raw value to a relevance score where higher is more relevant.
    pub fn to_score(self, raw: f32) -> f32 {
        match self {
            Self::Cosine => raw,
            Self::L2 => 1.0 / (1.0 + raw),
        }
    }
}

/// A storage backend for chunk vectors with filtered k-nearest search.
///
/// Upserts are idempotent by chunk id. A `search` running concurrently with
/// `upsert`/`delete` observes each entry either before or after the update,
/// never half-written.
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_rag::{DistanceMetric, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new(384, DistanceMetric::Cosine);
/// store.upsert(entry).await?;
/// let results = store.search(&query_vector, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// The fixed vector dimension of this store.
    fn dimensions(&self) -> usize;

    /// The metric results are ranked by.
    fn metric(&self) -> DistanceMetric;

    /// Insert an entry, replacing any existing entry with the same chunk id.
    async fn upsert(&self, entry: IndexEntry) -> Result<()>;

    /// Upsert many entries. The default calls [`upsert`](VectorStore::upsert) in order.
    async fn upsert_batch(&self, entries: Vec<IndexEntry>) -> Result<()> {
        for entry in entries {
            self.upsert(entry).await?;
        }
        Ok(())
    }

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, chunk_id: &str) -> Result<bool>;

    /// Remove every entry belonging to a document. Returns how many were removed.
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// Chunk ids currently stored for a document.
    async fn document_chunk_ids(&self, document_id: &str) -> Result<Vec<String>>;

    /// Replace a document's entries with `entries`. Returns how many stale
    /// entries (ids not present in `entries`) were removed.
    ///
    /// The default upserts first and then deletes the stale ids, so every
    /// chunk id that survives the replacement stays searchable throughout,
    /// and a failed upsert leaves the previous entries in place.
    async fn replace_document(&self, document_id: &str, entries: Vec<IndexEntry>) -> Result<usize> {
        let previous = self.document_chunk_ids(document_id).await?;
        let fresh: HashSet<String> = entries.iter().map(|e| e.chunk.id.clone()).collect();
        self.upsert_batch(entries).await?;

        let mut removed = 0;
        for id in previous.iter().filter(|id| !fresh.contains(*id)) {
            if self.delete(id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Return up to `k` entries closest to `query`, restricted to entries whose
    /// metadata satisfies `filter`.
    ///
    /// Results are ordered by descending relevance, ties broken by ascending
    /// chunk id. An empty store or filtered set yields an empty result.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Number of stored entries.
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
