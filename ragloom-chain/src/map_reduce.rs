//! Map-reduce strategy: `mapping → reducing → done`.
//!
//! Map requests run concurrently, bounded by the configured concurrency.
//! Their outcomes are reassembled in relevance order before the reduce
//! prompt is built, so completion timing never affects the result.

use futures::stream::{self, StreamExt};
use ragloom_rag::Chunk;
use tracing::{debug, warn};

use crate::error::{ChainError, Result};
use crate::orchestrator::{ChainScope, StepOutcome};
use crate::prompt::{format_partial, format_source, render};
use crate::request::{ChainResult, GenerationRequest};

pub(crate) const REDUCE_ID: &str = "reduce";

pub(crate) fn map_id(chunk_id: &str) -> String {
    format!("map:{chunk_id}")
}

struct Partial {
    chunk_id: String,
    text: String,
}

pub(crate) async fn run(
    scope: &ChainScope<'_>,
    chunks: &[Chunk],
    concurrency: usize,
) -> Result<ChainResult> {
    debug!(state = "mapping", chunks = chunks.len(), concurrency);
    if chunks.is_empty() {
        return Err(ChainError::AllMapsFailedError { failed: Vec::new() });
    }

    let requests: Vec<GenerationRequest> = chunks
        .iter()
        .map(|chunk| {
            let context = format_source(chunk);
            let prompt = render(&scope.templates.map, &[
                ("context", context.as_str()),
                ("question", scope.question),
            ]);
            scope.dispatcher.request(map_id(&chunk.id), prompt, vec![chunk.id.clone()])
        })
        .collect();

    let mut outcomes: Vec<(usize, StepOutcome)> = stream::iter(requests.iter().enumerate())
        .map(|(index, request)| async move { (index, scope.step(request).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    outcomes.sort_by_key(|(index, _)| *index);

    let mut partials = Vec::new();
    let mut failed = Vec::new();
    for ((_, outcome), chunk) in outcomes.into_iter().zip(chunks) {
        match outcome {
            StepOutcome::Completed(response) => {
                partials.push(Partial { chunk_id: chunk.id.clone(), text: response.text });
            }
            StepOutcome::Failed(err) => {
                warn!(request_id = %map_id(&chunk.id), error = %err, "Map step failed, excluding chunk");
                failed.push(map_id(&chunk.id));
            }
            StepOutcome::Cancelled => failed.push(map_id(&chunk.id)),
        }
    }

    if partials.is_empty() {
        if scope.cancel.is_cancelled() {
            debug!(state = "cancelled", failed = failed.len());
            failed.push(REDUCE_ID.to_string());
            return Ok(ChainResult { partial: true, failed, ..Default::default() });
        }
        return Err(ChainError::AllMapsFailedError { failed });
    }

    let (kept, prompt) = assemble_reduce(scope, &partials)?;
    let dropped: Vec<String> = partials[kept..].iter().map(|p| p.chunk_id.clone()).collect();
    if !dropped.is_empty() {
        warn!(dropped = dropped.len(), "Reduce prompt over budget, dropping lowest-ranked partial answers");
    }
    let sources = partials[..kept].iter().map(|p| p.chunk_id.clone()).collect();
    let request = scope.dispatcher.request(REDUCE_ID, prompt, sources);

    debug!(state = "reducing", partials = kept, failed = failed.len());
    match scope.step(&request).await {
        StepOutcome::Completed(response) => {
            debug!(state = "done", attempts = response.attempts);
            Ok(ChainResult {
                answer: response.text,
                citations: response.citations.into_iter().collect(),
                partial: !failed.is_empty(),
                failed,
                dropped,
            })
        }
        StepOutcome::Failed(err) => Err(err),
        StepOutcome::Cancelled => {
            debug!(state = "cancelled");
            failed.push(REDUCE_ID.to_string());
            Ok(ChainResult { partial: true, failed, dropped, ..Default::default() })
        }
    }
}

/// Keep the highest-ranked partial answers whose reduce prompt fits the context window.
fn assemble_reduce(scope: &ChainScope<'_>, partials: &[Partial]) -> Result<(usize, String)> {
    let limit = scope.dispatcher.context_window();
    let mut best: Option<(usize, String)> = None;
    for kept in 1..=partials.len() {
        let summaries = partials[..kept]
            .iter()
            .map(|p| format_partial(&p.chunk_id, &p.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = render(&scope.templates.reduce, &[
            ("summaries", summaries.as_str()),
            ("question", scope.question),
        ]);
        let cost = scope.dispatcher.cost(&prompt);
        if cost > limit {
            if best.is_none() {
                return Err(ChainError::BudgetError {
                    request_id: REDUCE_ID.to_string(),
                    cost,
                    limit,
                });
            }
            break;
        }
        best = Some((kept, prompt));
    }
    best.ok_or(ChainError::AllMapsFailedError { failed: Vec::new() })
}
