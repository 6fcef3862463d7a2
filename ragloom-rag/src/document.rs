//! Data types for documents, chunks, index entries, queries, and results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::MetadataFilter;

/// A scalar metadata value attached to documents and chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A text value.
    Text(String),
}

impl MetadataValue {
    /// Numeric view of the value, used by range filters.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Key-value metadata used for filtering.
pub type Metadata = HashMap<String, MetadataValue>;

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: Metadata,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: Metadata::new(), source_uri: None }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A segment of a [`Document`].
///
/// `start` and `end` are byte offsets into the parent document's text, so
/// `&document.text[chunk.start..chunk.end] == chunk.text`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, derived from the document id and start offset.
    pub id: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Byte offset of the first character in the parent document.
    pub start: usize,
    /// Byte offset one past the last character in the parent document.
    pub end: usize,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: Metadata,
}

impl Chunk {
    /// Build the chunk id for a document and start offset.
    ///
    /// The offset is zero padded so lexical order matches document order.
    pub fn make_id(document_id: &str, start: usize) -> String {
        format!("{document_id}#{start:08}")
    }
}

/// The stored unit of a [`VectorStore`](crate::VectorStore): a chunk and its vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The embedding of the chunk's text.
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }

    /// The chunk id this entry is keyed by.
    pub fn id(&self) -> &str {
        &self.chunk.id
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The relevance score (higher is more relevant).
    pub score: f32,
}

/// A retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// The raw query text.
    pub text: String,
    /// Optional metadata predicate applied inside the vector search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MetadataFilter>,
    /// Number of results requested.
    pub k: usize,
    /// Whether the candidate pool should be re-ranked.
    #[serde(default)]
    pub rerank: bool,
}

impl Query {
    /// Create a query for the `k` most relevant chunks.
    pub fn new(text: impl Into<String>, k: usize) -> Self {
        Self { text: text.into(), filter: None, k, rerank: false }
    }

    /// Restrict results to chunks whose metadata satisfies `filter`.
    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Request re-ranking of an oversampled candidate pool.
    pub fn with_rerank(mut self) -> Self {
        self.rerank = true;
        self
    }
}

/// Ranked output of the [`Retriever`](crate::Retriever).
///
/// Hits are ordered by decreasing relevance, ties broken by ascending chunk id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The ranked hits, at most `k` of them.
    pub hits: Vec<SearchResult>,
}

impl RetrievalResult {
    /// Wrap an already ranked list of hits.
    pub fn new(hits: Vec<SearchResult>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Chunks in relevance order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    /// Chunk ids in relevance order.
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.chunk.id.as_str()).collect()
    }
}
