//! Generation request/response types and the chain result.

use std::collections::BTreeSet;

use ragloom_rag::Chunk;
use serde::{Deserialize, Serialize};

/// Sampling parameters passed to the generation model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.2, max_tokens: 512 }
    }
}

/// One call to the generation model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// Sub-request identifier, e.g. `map:doc#00000000` or `reduce`.
    pub id: String,
    /// The fully assembled prompt.
    pub prompt: String,
    pub params: GenerationParams,
    /// Chunk ids whose content fed the prompt.
    pub sources: Vec<String>,
}

/// The model's answer to a [`GenerationRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    /// Id of the request this answers.
    pub request_id: String,
    /// The produced text.
    pub text: String,
    /// Chunk ids that contributed to the prompt.
    pub citations: Vec<String>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
}

/// Chunks selected for a single prompt plus the budget they were packed into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    /// Selected chunks, in relevance order.
    pub chunks: Vec<Chunk>,
    /// The cost limit the prompt had to fit.
    pub budget: usize,
    /// Cost of the assembled prompt.
    pub consumed: usize,
}

impl PromptContext {
    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.consumed)
    }

    pub fn chunk_ids(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.id.clone()).collect()
    }
}

/// Outcome of running a chain.
///
/// A result is complete only when `partial` is false; a partial result always
/// lists the sub-requests that did not complete in `failed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainResult {
    /// The final answer text. Empty if no generation completed.
    pub answer: String,
    /// Deduplicated chunk ids that contributed to the answer.
    pub citations: BTreeSet<String>,
    /// Whether some sub-requests failed or were cancelled.
    pub partial: bool,
    /// Ids of sub-requests that failed or never ran, in execution order.
    pub failed: Vec<String>,
    /// Chunk ids left out of a prompt because it would exceed the budget.
    pub dropped: Vec<String>,
}

impl ChainResult {
    pub fn is_complete(&self) -> bool {
        !self.partial
    }
}
