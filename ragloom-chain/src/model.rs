//! Generation model trait.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::request::GenerationParams;

/// An external text generation model.
///
/// Implementations are passed to the [`Dispatcher`](crate::Dispatcher)
/// explicitly, so tests can substitute deterministic stubs.
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_chain::{GenerationModel, GenerationParams};
///
/// let text = model.generate("Summarize: ...", &GenerationParams::default()).await?;
/// ```
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}
