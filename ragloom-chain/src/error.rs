//! Error types for the `ragloom-chain` crate.

use std::time::Duration;

use ragloom_rag::RagError;
use thiserror::Error;

/// Failures reported by a [`GenerationModel`](crate::GenerationModel).
///
/// All variants are treated as transient by the [`Dispatcher`](crate::Dispatcher)
/// and retried up to the configured attempt limit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    /// The provider rejected the call for rate reasons.
    #[error("rate limited")]
    RateLimited {
        /// Server-suggested wait before the next attempt.
        retry_after: Option<Duration>,
    },

    /// The call did not complete in time.
    #[error("generation timed out")]
    Timeout,

    /// The model or its transport reported an error.
    #[error("model error: {0}")]
    ModelError(String),
}

/// Errors that abort a chain (or a single sub-request within one).
#[derive(Debug, Error)]
pub enum ChainError {
    /// Invalid chain, dispatch, or template configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An assembled prompt does not fit the budget.
    #[error("Budget error ({request_id}): prompt costs {cost}, limit is {limit}")]
    BudgetError {
        /// The sub-request whose prompt was rejected.
        request_id: String,
        /// Cost of the smallest prompt that could be assembled.
        cost: usize,
        /// The budget it was checked against.
        limit: usize,
    },

    /// Retrieval produced no chunks to generate from.
    #[error("Empty context: retrieval returned no chunks")]
    EmptyContextError,

    /// Every map step of a map-reduce chain failed.
    #[error("All map steps failed ({} sub-requests)", failed.len())]
    AllMapsFailedError {
        /// Ids of the failed map sub-requests, in relevance order.
        failed: Vec<String>,
    },

    /// A generation call failed after exhausting its retries.
    #[error("Generation failed ({request_id}) after {attempts} attempt(s): {source}")]
    GenerationFailed {
        /// The sub-request that failed.
        request_id: String,
        /// How many attempts were made.
        attempts: u32,
        /// The last error returned by the model.
        #[source]
        source: GenerationError,
    },

    /// An error propagated from retrieval.
    #[error(transparent)]
    Rag(#[from] RagError),
}

/// A convenience result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;
