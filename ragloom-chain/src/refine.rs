//! Refine strategy: `init → refining(i) → done`, strictly sequential.

use std::collections::BTreeSet;

use ragloom_rag::Chunk;
use tracing::{debug, warn};

use crate::error::{ChainError, Result};
use crate::orchestrator::{ChainScope, StepOutcome};
use crate::prompt::{format_source, render};
use crate::request::ChainResult;

pub(crate) fn refine_id(chunk_id: &str) -> String {
    format!("refine:{chunk_id}")
}

pub(crate) async fn run(scope: &ChainScope<'_>, chunks: &[Chunk]) -> Result<ChainResult> {
    let Some(first) = chunks.first() else {
        return Err(ChainError::EmptyContextError);
    };
    debug!(state = "init", chunks = chunks.len());

    let context = format_source(first);
    let prompt = render(&scope.templates.refine_initial, &[
        ("context", context.as_str()),
        ("question", scope.question),
    ]);
    let request = scope.dispatcher.request(refine_id(&first.id), prompt, vec![first.id.clone()]);

    let mut answer = match scope.step(&request).await {
        StepOutcome::Completed(response) => response.text,
        StepOutcome::Failed(err) => return Err(err),
        StepOutcome::Cancelled => {
            debug!(state = "cancelled", step = 0);
            return Ok(ChainResult {
                partial: true,
                failed: chunks.iter().map(|c| refine_id(&c.id)).collect(),
                ..Default::default()
            });
        }
    };
    let mut citations = BTreeSet::from([first.id.clone()]);

    for (step, chunk) in chunks.iter().enumerate().skip(1) {
        debug!(state = "refining", step);
        let context = format_source(chunk);
        let prompt = render(&scope.templates.refine_step, &[
            ("answer", answer.as_str()),
            ("context", context.as_str()),
            ("question", scope.question),
        ]);
        let request = scope.dispatcher.request(refine_id(&chunk.id), prompt, vec![chunk.id.clone()]);

        match scope.step(&request).await {
            StepOutcome::Completed(response) => {
                answer = response.text;
                citations.extend(response.citations);
            }
            outcome => {
                if let StepOutcome::Failed(err) = &outcome {
                    warn!(request_id = %request.id, step, error = %err, "Refine step failed, keeping previous answer");
                } else {
                    debug!(state = "cancelled", step);
                }
                let failed = chunks[step..].iter().map(|c| refine_id(&c.id)).collect();
                return Ok(ChainResult { answer, citations, partial: true, failed, dropped: Vec::new() });
            }
        }
    }

    debug!(state = "done", steps = chunks.len());
    Ok(ChainResult { answer, citations, partial: false, failed: Vec::new(), dropped: Vec::new() })
}
