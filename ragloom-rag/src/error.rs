//! Error types for the `ragloom-rag` crate.

use thiserror::Error;

/// Errors that can occur while chunking, indexing, or retrieving.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Raised before any work starts.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A vector whose length does not match the store dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionError {
        /// The dimension the store was created with.
        expected: usize,
        /// The dimension of the offending vector.
        actual: usize,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading or writing a store snapshot failed.
    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
