//! Chain strategy selection and configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::prompt::PromptTemplates;

/// How retrieved chunks are turned into an answer.
///
/// Selected once per chain invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainStrategy {
    /// Pack as many chunks as fit into a single prompt.
    Stuff {
        /// Prompt cost limit. The dispatcher's context window always applies
        /// as well; the smaller of the two wins.
        #[serde(default)]
        budget: Option<usize>,
    },
    /// Answer per chunk in parallel, then combine the partial answers.
    MapReduce {
        /// Maximum map requests in flight at once.
        concurrency: usize,
    },
    /// Build the answer chunk by chunk, sequentially.
    Refine,
}

impl Default for ChainStrategy {
    fn default() -> Self {
        Self::Stuff { budget: None }
    }
}

impl ChainStrategy {
    pub fn stuff() -> Self {
        Self::default()
    }

    pub fn map_reduce(concurrency: usize) -> Self {
        Self::MapReduce { concurrency }
    }

    pub fn refine() -> Self {
        Self::Refine
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Stuff { .. } => "stuff",
            Self::MapReduce { .. } => "map_reduce",
            Self::Refine => "refine",
        }
    }
}

/// Configuration for a [`ChainOrchestrator`](crate::ChainOrchestrator).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChainConfig {
    pub strategy: ChainStrategy,
    pub templates: PromptTemplates,
    /// Wall-clock limit for one chain run. When it elapses, no further
    /// requests are dispatched and a partial result is returned.
    pub deadline: Option<Duration>,
}

impl ChainConfig {
    pub fn new(strategy: ChainStrategy) -> Self {
        Self { strategy, ..Default::default() }
    }

    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.strategy {
            ChainStrategy::Stuff { budget: Some(0) } => {
                return Err(ChainError::ConfigError("stuff budget must be greater than 0".into()));
            }
            ChainStrategy::MapReduce { concurrency: 0 } => {
                return Err(ChainError::ConfigError(
                    "map-reduce concurrency must be greater than 0".into(),
                ));
            }
            _ => {}
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ChainError::ConfigError("deadline must be greater than 0".into()));
        }
        self.templates.validate()
    }
}
