//! Stuff strategy: `assembling → sent → done`.

use ragloom_rag::Chunk;
use tracing::debug;

use crate::error::{ChainError, Result};
use crate::orchestrator::{ChainScope, StepOutcome};
use crate::prompt::{format_sources, render};
use crate::request::{ChainResult, PromptContext};

pub(crate) const REQUEST_ID: &str = "stuff";

pub(crate) async fn run(
    scope: &ChainScope<'_>,
    chunks: &[Chunk],
    budget: Option<usize>,
) -> Result<ChainResult> {
    debug!(state = "assembling", chunks = chunks.len());
    if chunks.is_empty() {
        return Err(ChainError::EmptyContextError);
    }

    let window = scope.dispatcher.context_window();
    let limit = budget.map_or(window, |b| b.min(window));
    let (context, prompt) = assemble(scope, chunks, limit)?;
    let dropped: Vec<String> = chunks[context.chunks.len()..].iter().map(|c| c.id.clone()).collect();

    let request = scope.dispatcher.request(REQUEST_ID, prompt, context.chunk_ids());
    debug!(
        state = "sent",
        kept = context.chunks.len(),
        dropped = dropped.len(),
        consumed = context.consumed,
        remaining = context.remaining()
    );

    match scope.step(&request).await {
        StepOutcome::Completed(response) => {
            debug!(state = "done", attempts = response.attempts);
            Ok(ChainResult {
                answer: response.text,
                citations: response.citations.into_iter().collect(),
                partial: false,
                failed: Vec::new(),
                dropped,
            })
        }
        StepOutcome::Failed(err) => Err(err),
        StepOutcome::Cancelled => {
            debug!(state = "cancelled");
            Ok(ChainResult {
                partial: true,
                failed: vec![REQUEST_ID.to_string()],
                dropped,
                ..Default::default()
            })
        }
    }
}

/// Keep the longest prefix of `chunks` whose rendered prompt fits `limit`.
///
/// Chunks are never reordered or skipped: packing stops at the first chunk
/// that would overflow.
fn assemble(scope: &ChainScope<'_>, chunks: &[Chunk], limit: usize) -> Result<(PromptContext, String)> {
    let mut best: Option<(usize, usize, String)> = None;
    for kept in 1..=chunks.len() {
        let context = format_sources(&chunks[..kept]);
        let prompt = render(&scope.templates.stuff, &[
            ("context", context.as_str()),
            ("question", scope.question),
        ]);
        let cost = scope.dispatcher.cost(&prompt);
        if cost > limit {
            if best.is_none() {
                return Err(ChainError::BudgetError {
                    request_id: REQUEST_ID.to_string(),
                    cost,
                    limit,
                });
            }
            break;
        }
        best = Some((kept, cost, prompt));
    }

    match best {
        Some((kept, consumed, prompt)) => Ok((
            PromptContext { chunks: chunks[..kept].to_vec(), budget: limit, consumed },
            prompt,
        )),
        None => Err(ChainError::EmptyContextError),
    }
}
