//! # ragloom-rag
//!
//! Chunking, vector indexing, and hybrid retrieval for ragloom.
//!
//! ## Overview
//!
//! - [`TextChunker`] splits documents into overlapping fragments under a
//!   [`ChunkerConfig`] size policy
//! - [`VectorStore`] holds [`IndexEntry`]s and answers filtered k-nearest
//!   queries; [`InMemoryVectorStore`] is an exact, snapshot-able implementation
//! - [`Indexer`] runs chunk → embed → upsert, replacing re-indexed documents
//! - [`Retriever`] runs embed → filtered search → optional rerank
//!
//! Embedding models and rerankers are external collaborators injected through
//! the [`EmbeddingProvider`] and [`Reranker`] traits.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragloom_rag::*;
//!
//! let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions(), DistanceMetric::Cosine));
//! let indexer = Indexer::builder()
//!     .embedding_provider(embedder.clone())
//!     .vector_store(store.clone())
//!     .chunker(Arc::new(TextChunker::new(ChunkerConfig::default())?))
//!     .build()?;
//! indexer.index(&Document::new("doc-a", "Doc A text...")).await?;
//!
//! let retriever = Retriever::builder()
//!     .embedding_provider(embedder)
//!     .vector_store(store)
//!     .build()?;
//! let result = retriever.retrieve(&Query::new("Explain RAG", 2)).await?;
//! ```
//!
//! ## Features
//!
//! - `openai` — [`openai::OpenAIEmbeddingProvider`] for OpenAI-compatible endpoints

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod indexer;
pub mod inmemory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod reranker;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, TextChunker, chunk};
pub use config::{Boundary, ChunkerConfig, RagConfig, RagConfigBuilder};
pub use document::{
    Chunk, Document, IndexEntry, Metadata, MetadataValue, Query, RetrievalResult, SearchResult,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use filter::MetadataFilter;
pub use indexer::{Indexer, IndexerBuilder};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use reranker::{KeywordOverlapReranker, Reranker};
pub use retriever::{Retriever, RetrieverBuilder};
pub use vectorstore::{DistanceMetric, VectorStore};
