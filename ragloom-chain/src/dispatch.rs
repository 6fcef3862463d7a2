//! Generation dispatch: budget check, per-call timeout and bounded retry.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::budget::{CharCount, CostFunction};
use crate::error::{ChainError, GenerationError, Result};
use crate::model::GenerationModel;
use crate::request::{GenerationParams, GenerationRequest, GenerationResponse};

/// Bounded exponential backoff.
///
/// The delay before attempt `n + 1` is `initial_backoff * multiplier^(n - 1)`,
/// capped at `max_backoff`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ChainError::ConfigError("max_attempts must be at least 1".into()));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ChainError::ConfigError(format!(
                "backoff multiplier must be finite and >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ChainError::ConfigError(format!(
                "initial_backoff ({:?}) exceeds max_backoff ({:?})",
                self.initial_backoff, self.max_backoff
            )));
        }
        Ok(())
    }

    /// Delay after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Settings applied to every generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Largest prompt cost the model accepts, in units of the cost function.
    pub context_window: usize,
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Parameters attached to requests created with [`Dispatcher::request`].
    pub params: GenerationParams,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            context_window: 16_000,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            params: GenerationParams::default(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            return Err(ChainError::ConfigError("context_window must be greater than 0".into()));
        }
        if self.timeout.is_zero() {
            return Err(ChainError::ConfigError("timeout must be greater than 0".into()));
        }
        self.retry.validate()
    }
}

/// Sends [`GenerationRequest`]s to a [`GenerationModel`].
///
/// Every dispatch is checked against the context window before the model is
/// called, then attempted up to `retry.max_attempts` times with each attempt
/// bounded by `timeout`. Exhausted requests surface as
/// [`ChainError::GenerationFailed`] carrying the last model error.
pub struct Dispatcher {
    model: Arc<dyn GenerationModel>,
    cost: Arc<dyn CostFunction>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher that measures prompts in characters.
    pub fn new(model: Arc<dyn GenerationModel>, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { model, cost: Arc::new(CharCount), config })
    }

    /// Replace the cost function used for budget checks.
    pub fn with_cost_function(mut self, cost: impl CostFunction + 'static) -> Self {
        self.cost = Arc::new(cost);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn context_window(&self) -> usize {
        self.config.context_window
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Cost of `text` under the configured cost function.
    pub fn cost(&self, text: &str) -> usize {
        self.cost.cost(text)
    }

    /// Build a request carrying the default parameters.
    pub fn request(
        &self,
        id: impl Into<String>,
        prompt: impl Into<String>,
        sources: Vec<String>,
    ) -> GenerationRequest {
        GenerationRequest {
            id: id.into(),
            prompt: prompt.into(),
            params: self.config.params.clone(),
            sources,
        }
    }

    /// Dispatch a request to the model.
    pub async fn dispatch(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let cost = self.cost(&request.prompt);
        let limit = self.config.context_window;
        if cost > limit {
            error!(request_id = %request.id, cost, limit, "Prompt exceeds context window");
            return Err(ChainError::BudgetError { request_id: request.id.clone(), cost, limit });
        }

        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.config.timeout,
                self.model.generate(&request.prompt, &request.params),
            )
            .await
            .unwrap_or(Err(GenerationError::Timeout));

            let err = match outcome {
                Ok(text) => {
                    debug!(
                        request_id = %request.id,
                        model = %self.model.name(),
                        attempt,
                        cost,
                        "Generation completed"
                    );
                    return Ok(GenerationResponse {
                        request_id: request.id.clone(),
                        text,
                        citations: request.sources.clone(),
                        attempts: attempt,
                    });
                }
                Err(err) => err,
            };

            if attempt >= policy.max_attempts {
                error!(
                    request_id = %request.id,
                    model = %self.model.name(),
                    attempts = attempt,
                    error = %err,
                    "Generation failed"
                );
                return Err(ChainError::GenerationFailed {
                    request_id: request.id.clone(),
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = match &err {
                GenerationError::RateLimited { retry_after: Some(wait) } => {
                    (*wait).min(policy.max_backoff)
                }
                _ => policy.backoff(attempt),
            };
            warn!(
                request_id = %request.id,
                attempt,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Generation attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}
