//! Configuration for chunking and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Where the chunker is allowed to place split points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Any character position.
    Char,
    /// After sentence-ending punctuation followed by whitespace.
    #[default]
    Sentence,
    /// After a blank line.
    Paragraph,
}

/// Size policy for splitting documents, measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters.
    pub max_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    /// Allowed split points.
    #[serde(default)]
    pub boundary: Boundary,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_size: 512, overlap: 64, boundary: Boundary::Sentence }
    }
}

impl ChunkerConfig {
    /// Create a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `max_size == 0` or `overlap >= max_size`.
    pub fn new(max_size: usize, overlap: usize, boundary: Boundary) -> Result<Self> {
        let config = Self { max_size, overlap, boundary };
        config.validate()?;
        Ok(config)
    }

    /// Check that the size policy is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(RagError::ConfigError("max_size must be greater than zero".to_string()));
        }
        if self.overlap >= self.max_size {
            return Err(RagError::ConfigError(format!(
                "overlap ({}) must be less than max_size ({})",
                self.overlap, self.max_size
            )));
        }
        Ok(())
    }
}

/// Configuration parameters for indexing and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// How documents are split into chunks.
    pub chunking: ChunkerConfig,
    /// Default number of results when a caller does not specify `k`.
    pub top_k: usize,
    /// Candidate pool size searched before re-ranking.
    pub rerank_pool_size: usize,
    /// Optional minimum score; hits below it are dropped after ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkerConfig::default(),
            top_k: 10,
            rerank_pool_size: 50,
            similarity_threshold: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check all fields for consistency.
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.rerank_pool_size == 0 {
            return Err(RagError::ConfigError(
                "rerank_pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunking.max_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunking.overlap = overlap;
        self
    }

    /// Set where split points may fall.
    pub fn boundary(mut self, boundary: Boundary) -> Self {
        self.config.chunking.boundary = boundary;
        self
    }

    /// Set the default number of results.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the oversampled pool size used when re-ranking.
    pub fn rerank_pool_size(mut self, size: usize) -> Self {
        self.config.rerank_pool_size = size;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size` or `chunk_size == 0`
    /// - `top_k == 0`
    /// - `rerank_pool_size == 0`
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
