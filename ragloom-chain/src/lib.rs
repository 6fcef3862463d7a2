//! # ragloom-chain
//!
//! Turns retrieval results into answers with citations.
//!
//! ## Overview
//!
//! - [`Dispatcher`] sends [`GenerationRequest`]s to a [`GenerationModel`],
//!   rejecting prompts over the context window and retrying transient
//!   failures with bounded exponential backoff
//! - [`ChainOrchestrator`] runs one [`ChainStrategy`] over a
//!   [`RetrievalResult`](ragloom_rag::RetrievalResult):
//!   - `Stuff` packs the top chunks into one prompt
//!   - `MapReduce` answers per chunk concurrently, then combines
//!   - `Refine` improves a running answer chunk by chunk
//!
//! Every [`ChainResult`] says whether it is complete, which sub-requests
//! failed and which chunks were dropped for budget reasons.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ragloom_chain::*;
//!
//! let dispatcher = Arc::new(Dispatcher::new(model, DispatchConfig::default())?);
//! let chain = ChainOrchestrator::new(dispatcher, ChainConfig::new(ChainStrategy::refine()))?;
//! let result = chain.answer(&retriever, &retriever.query("Explain RAG")).await?;
//! println!("{} {:?}", result.answer, result.citations);
//! ```
//!
//! ## Features
//!
//! - `openai` — [`openai::OpenAIChatModel`] for OpenAI-compatible endpoints

pub mod budget;
pub mod config;
pub mod dispatch;
pub mod error;
mod map_reduce;
pub mod model;
#[cfg(feature = "openai")]
pub mod openai;
pub mod orchestrator;
pub mod prompt;
mod refine;
pub mod request;
mod stuff;

pub use budget::{CharCount, CostFunction, WordCount};
pub use config::{ChainConfig, ChainStrategy};
pub use dispatch::{DispatchConfig, Dispatcher, RetryPolicy};
pub use error::{ChainError, GenerationError, Result};
pub use model::GenerationModel;
#[cfg(feature = "openai")]
pub use openai::OpenAIChatModel;
pub use orchestrator::ChainOrchestrator;
pub use prompt::PromptTemplates;
pub use request::{ChainResult, GenerationParams, GenerationRequest, GenerationResponse, PromptContext};
pub use tokio_util::sync::CancellationToken;
