//! The chain orchestrator: retrieval result + query → [`ChainResult`].

use std::sync::Arc;

use ragloom_rag::{Chunk, Query, RetrievalResult, Retriever};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use crate::config::{ChainConfig, ChainStrategy};
use crate::dispatch::Dispatcher;
use crate::error::{ChainError, Result};
use crate::prompt::PromptTemplates;
use crate::request::{ChainResult, GenerationRequest, GenerationResponse};
use crate::{map_reduce, refine, stuff};

/// Runs one chain strategy over a [`RetrievalResult`].
///
/// Every run executes inside a `chain.execute` span and emits a `debug!`
/// event with a `state` field on each strategy state transition.
///
/// # Example
///
/// ```rust,ignore
/// let dispatcher = Arc::new(Dispatcher::new(model, DispatchConfig::default())?);
/// let chain = ChainOrchestrator::new(dispatcher, ChainConfig::new(ChainStrategy::map_reduce(4)))?;
///
/// let retrieval = retriever.retrieve(&query).await?;
/// let result = chain.execute(&retrieval, &query).await?;
/// if result.partial {
///     eprintln!("incomplete: {:?}", result.failed);
/// }
/// ```
pub struct ChainOrchestrator {
    dispatcher: Arc<Dispatcher>,
    config: ChainConfig,
}

impl ChainOrchestrator {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { dispatcher, config })
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run the configured strategy to completion (or until the deadline).
    pub async fn execute(&self, retrieval: &RetrievalResult, query: &Query) -> Result<ChainResult> {
        self.execute_with_cancel(retrieval, query, CancellationToken::new()).await
    }

    /// Run the configured strategy until it completes or `cancel` fires.
    ///
    /// Once cancelled, no new generation requests are dispatched and
    /// in-flight ones are abandoned. The run then returns a partial
    /// [`ChainResult`] whose `failed` list names every uncompleted
    /// sub-request.
    pub async fn execute_with_cancel(
        &self,
        retrieval: &RetrievalResult,
        query: &Query,
        cancel: CancellationToken,
    ) -> Result<ChainResult> {
        let span = info_span!(
            "chain.execute",
            strategy = self.config.strategy.name(),
            chunks = retrieval.len(),
            model = %self.dispatcher.model_name(),
        );
        async move {
            let chunks: Vec<Chunk> = retrieval.chunks().cloned().collect();
            let token = cancel.child_token();
            let scope = ChainScope {
                dispatcher: &self.dispatcher,
                templates: &self.config.templates,
                question: &query.text,
                cancel: &token,
            };

            let work = self.run_strategy(&scope, &chunks);
            tokio::pin!(work);
            let result = match self.config.deadline {
                Some(deadline) => {
                    tokio::select! {
                        result = &mut work => result,
                        _ = tokio::time::sleep(deadline) => {
                            warn!(deadline_ms = deadline.as_millis() as u64, "Chain deadline reached, cancelling");
                            token.cancel();
                            work.await
                        }
                    }
                }
                None => work.await,
            };

            if let Ok(result) = &result {
                info!(
                    partial = result.partial,
                    failed = result.failed.len(),
                    dropped = result.dropped.len(),
                    citations = result.citations.len(),
                    "Chain completed"
                );
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Retrieve for `query`, then run the chain over the result.
    pub async fn answer(&self, retriever: &Retriever, query: &Query) -> Result<ChainResult> {
        let retrieval = retriever.retrieve(query).await?;
        self.execute(&retrieval, query).await
    }

    async fn run_strategy(&self, scope: &ChainScope<'_>, chunks: &[Chunk]) -> Result<ChainResult> {
        match &self.config.strategy {
            ChainStrategy::Stuff { budget } => stuff::run(scope, chunks, *budget).await,
            ChainStrategy::MapReduce { concurrency } => {
                map_reduce::run(scope, chunks, *concurrency).await
            }
            ChainStrategy::Refine => refine::run(scope, chunks).await,
        }
    }
}

impl std::fmt::Debug for ChainOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainOrchestrator")
            .field("dispatcher", &self.dispatcher)
            .field("strategy", &self.config.strategy)
            .finish()
    }
}

/// Everything a strategy needs for one run.
pub(crate) struct ChainScope<'a> {
    pub dispatcher: &'a Dispatcher,
    pub templates: &'a PromptTemplates,
    pub question: &'a str,
    pub cancel: &'a CancellationToken,
}

/// How a single sub-request ended.
pub(crate) enum StepOutcome {
    Completed(GenerationResponse),
    Failed(ChainError),
    Cancelled,
}

impl ChainScope<'_> {
    /// Dispatch `request` unless the run has been cancelled.
    pub async fn step(&self, request: &GenerationRequest) -> StepOutcome {
        if self.cancel.is_cancelled() {
            return StepOutcome::Cancelled;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => StepOutcome::Cancelled,
            result = self.dispatcher.dispatch(request) => match result {
                Ok(response) => StepOutcome::Completed(response),
                Err(err) => StepOutcome::Failed(err),
            },
        }
    }
}
