//! Stuff, map-reduce and refine chains against scripted models.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{ConcurrencyModel, Reply, ScriptedModel, chunk, orchestrator, retrieval, templates};
use ragloom_chain::prompt::{format_sources, render};
use ragloom_chain::{
    CancellationToken, ChainConfig, ChainError, ChainOrchestrator, ChainStrategy, CostFunction,
    CharCount, Dispatcher, GenerationError,
};
use ragloom_rag::Query;
use ragloom_telemetry::SpanCapture;
use tracing_subscriber::layer::SubscriberExt;

const A: &str = "doc-a#00000000";
const B: &str = "doc-b#00000000";
const C: &str = "doc-c#00000000";
const D: &str = "doc-d#00000000";

fn ids(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn query() -> Query {
    Query::new("What is RAG?", 4)
}

fn four_chunks() -> ragloom_rag::RetrievalResult {
    retrieval(&[
        (A, "alpha text about retrieval."),
        (B, "beta text about generation."),
        (C, "gamma text about chunking."),
        (D, "delta text about vectors."),
    ])
}

// ---- stuff ----

#[tokio::test]
async fn stuff_keeps_top_ranked_chunks_within_budget() {
    let chunks = [(A, "alpha ".repeat(10)), (B, "beta ".repeat(10)), (C, "gamma ".repeat(10))];
    let borrowed: Vec<(&str, &str)> = chunks.iter().map(|(id, t)| (*id, t.as_str())).collect();
    let retrieved = retrieval(&borrowed);

    // budget admits exactly the first chunk
    let first = chunk(A, &chunks[0].1);
    let one_chunk_prompt = render(&templates().stuff, &[
        ("context", format_sources([&first]).as_str()),
        ("question", query().text.as_str()),
    ]);
    let budget = CharCount.cost(&one_chunk_prompt);

    let model = Arc::new(ScriptedModel::new(vec![("STUFF", Reply::text("stuffed answer"))]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::Stuff { budget: Some(budget) });

    let result = chain.execute(&retrieved, &query()).await.unwrap();

    assert_eq!(result.answer, "stuffed answer");
    assert_eq!(result.citations, ids(&[A]));
    assert_eq!(result.dropped, vec![B.to_string(), C.to_string()]);
    assert!(result.is_complete());
    assert_eq!(model.calls(), 1);
    assert_eq!(model.prompts()[0], one_chunk_prompt);
}

#[tokio::test]
async fn stuff_uses_all_chunks_in_retrieval_order_when_they_fit() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::stuff());

    let result = chain.execute(&four_chunks(), &query()).await.unwrap();

    assert_eq!(result.citations, ids(&[A, B, C, D]));
    assert!(result.dropped.is_empty());
    let prompt = &model.prompts()[0];
    let positions: Vec<usize> = ["alpha", "beta", "gamma", "delta"]
        .iter()
        .map(|w| prompt.find(w).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn stuff_context_window_caps_the_budget() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model.clone(), 10, ChainStrategy::Stuff { budget: Some(10_000) });

    let err = chain.execute(&four_chunks(), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::BudgetError { ref request_id, limit: 10, .. } if request_id == "stuff"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn stuff_with_no_chunks_is_empty_context() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::stuff());

    let err = chain.execute(&retrieval(&[]), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::EmptyContextError));
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn stuff_generation_failure_is_surfaced() {
    let model = Arc::new(ScriptedModel::new(vec![(
        "STUFF",
        Reply::Fail(GenerationError::ModelError("down".into())),
    )]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::stuff());

    let err = chain.execute(&four_chunks(), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::GenerationFailed { ref request_id, attempts: 2, .. } if request_id == "stuff"));
}

// ---- map-reduce ----

fn map_rules(beta: Reply) -> Vec<(&'static str, Reply)> {
    vec![
        ("REDUCE", Reply::text("final answer")),
        ("alpha text", Reply::text("summary of alpha")),
        ("beta text", beta),
        ("gamma text", Reply::text("summary of gamma")),
        ("delta text", Reply::text("summary of delta")),
    ]
}

fn reduce_prompt(model: &ScriptedModel) -> String {
    model.prompts().into_iter().find(|p| p.starts_with("REDUCE")).unwrap()
}

#[tokio::test(start_paused = true)]
async fn map_reduce_excludes_failed_map_and_still_reduces() {
    let model = Arc::new(ScriptedModel::new(map_rules(Reply::Fail(GenerationError::ModelError(
        "bad chunk".into(),
    )))));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::map_reduce(2));

    let result = chain.execute(&four_chunks(), &query()).await.unwrap();

    assert_eq!(result.answer, "final answer");
    assert_eq!(result.failed, vec![format!("map:{B}")]);
    assert_eq!(result.citations, ids(&[A, C, D]));
    assert!(result.partial);

    let reduce = reduce_prompt(&model);
    assert!(reduce.contains("summary of alpha"));
    assert!(reduce.contains("summary of gamma"));
    assert!(reduce.contains("summary of delta"));
    assert!(!reduce.contains(B));
}

#[tokio::test(start_paused = true)]
async fn reduce_input_follows_relevance_order_not_completion_order() {
    let mut rules = map_rules(Reply::text("summary of beta"));
    // the top-ranked map finishes last
    rules[1] = ("alpha text", Reply::Delayed(Duration::from_secs(5), "summary of alpha".into()));
    let model = Arc::new(ScriptedModel::new(rules));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::map_reduce(4));

    let result = chain.execute(&four_chunks(), &query()).await.unwrap();
    assert!(result.is_complete());
    assert_eq!(result.citations, ids(&[A, B, C, D]));

    let reduce = reduce_prompt(&model);
    let positions: Vec<usize> = ["summary of alpha", "summary of beta", "summary of gamma", "summary of delta"]
        .iter()
        .map(|s| reduce.find(s).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "reduce prompt out of order: {reduce}");
}

#[tokio::test(start_paused = true)]
async fn map_reduce_with_every_map_failing_is_fatal() {
    let model = Arc::new(ScriptedModel::new(vec![(
        "MAP",
        Reply::Fail(GenerationError::ModelError("nope".into())),
    )]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::map_reduce(3));

    let err = chain.execute(&four_chunks(), &query()).await.unwrap_err();
    match err {
        ChainError::AllMapsFailedError { failed } => {
            let expected: Vec<String> = [A, B, C, D].iter().map(|id| format!("map:{id}")).collect();
            assert_eq!(failed, expected);
        }
        other => panic!("expected AllMapsFailedError, got {other:?}"),
    }
    assert!(model.prompts().iter().all(|p| !p.starts_with("REDUCE")));
}

#[tokio::test]
async fn map_reduce_with_no_chunks_fails_with_no_maps() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model, 10_000, ChainStrategy::map_reduce(2));

    let err = chain.execute(&retrieval(&[]), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::AllMapsFailedError { ref failed } if failed.is_empty()));
}

#[tokio::test]
async fn reduce_drops_lowest_ranked_partials_to_fit() {
    let long = "x".repeat(200);
    let model = Arc::new(ScriptedModel::new(vec![
        ("REDUCE", Reply::text("final")),
        ("MAP", Reply::Text(long)),
    ]));
    // each map prompt fits, but only one 200-char partial fits the reduce prompt
    let chain = orchestrator(model.clone(), 300, ChainStrategy::map_reduce(2));

    let result = chain.execute(&four_chunks(), &query()).await.unwrap();

    assert_eq!(result.answer, "final");
    assert_eq!(result.citations, ids(&[A]));
    assert_eq!(result.dropped, vec![B.to_string(), C.to_string(), D.to_string()]);
    assert!(result.failed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn map_fan_out_never_exceeds_configured_concurrency() {
    let model = Arc::new(ConcurrencyModel::new(Duration::from_secs(1)));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::map_reduce(2));
    let chunks = retrieval(&[
        (A, "alpha text."),
        (B, "beta text."),
        (C, "gamma text."),
        (D, "delta text."),
        ("doc-e#00000000", "epsilon text."),
    ]);

    let start = tokio::time::Instant::now();
    let result = chain.execute(&chunks, &query()).await.unwrap();

    assert_eq!(result.answer, "combined");
    assert!(result.is_complete());
    assert_eq!(model.peak(), 2);
    assert_eq!(model.calls(), 6);
    // five one-second maps, two at a time
    assert!(start.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn oversized_map_prompt_counts_as_failed_map() {
    let model = Arc::new(ScriptedModel::new(vec![("REDUCE", Reply::text("final"))]));
    let chain = orchestrator(model.clone(), 150, ChainStrategy::map_reduce(2));
    let huge = "z".repeat(200);
    let chunks = retrieval(&[
        (A, "alpha text about retrieval."),
        (B, huge.as_str()),
        (C, "gamma text about chunking."),
        (D, "delta text about vectors."),
    ]);

    let result = chain.execute(&chunks, &query()).await.unwrap();

    assert_eq!(result.answer, "final");
    assert_eq!(result.failed, vec![format!("map:{B}")]);
    assert!(result.partial);
    assert_eq!(result.citations, ids(&[A, C, D]));
    // three maps and the reduce; the oversized map never reached the model
    assert_eq!(model.calls(), 4);
    assert!(model.prompts().iter().all(|p| !p.contains(&huge)));
}

// ---- refine ----

#[tokio::test(start_paused = true)]
async fn refine_returns_last_good_answer_when_a_step_times_out() {
    let model = Arc::new(ScriptedModel::new(vec![
        ("gamma text", Reply::Hang),
        ("beta text", Reply::text("answer after beta")),
        ("alpha text", Reply::text("answer after alpha")),
    ]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::refine());
    let retrieved = retrieval(&[
        (A, "alpha text about retrieval."),
        (B, "beta text about generation."),
        (C, "gamma text about chunking."),
    ]);

    let result = chain.execute(&retrieved, &query()).await.unwrap();

    assert_eq!(result.answer, "answer after beta");
    assert!(result.partial);
    assert_eq!(result.failed, vec![format!("refine:{C}")]);
    assert_eq!(result.citations, ids(&[A, B]));

    let prompts = model.prompts();
    assert!(prompts[0].starts_with("INIT"));
    assert!(prompts[1].starts_with("STEP\nanswer after alpha"));
    assert!(prompts[2].contains("answer after beta"));
}

#[tokio::test]
async fn refine_runs_every_step_in_order() {
    let model = Arc::new(ScriptedModel::new(vec![
        ("delta text", Reply::text("v4")),
        ("gamma text", Reply::text("v3")),
        ("beta text", Reply::text("v2")),
        ("alpha text", Reply::text("v1")),
    ]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::refine());

    let result = chain.execute(&four_chunks(), &query()).await.unwrap();

    assert_eq!(result.answer, "v4");
    assert!(result.is_complete());
    assert_eq!(result.citations, ids(&[A, B, C, D]));
    assert_eq!(model.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn refine_initial_failure_is_surfaced() {
    let model = Arc::new(ScriptedModel::new(vec![(
        "INIT",
        Reply::Fail(GenerationError::ModelError("down".into())),
    )]));
    let chain = orchestrator(model, 10_000, ChainStrategy::refine());

    let err = chain.execute(&four_chunks(), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::GenerationFailed { ref request_id, .. } if request_id == &format!("refine:{A}")));
}

#[tokio::test]
async fn refine_with_no_chunks_is_empty_context() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model, 10_000, ChainStrategy::refine());

    let err = chain.execute(&retrieval(&[]), &query()).await.unwrap_err();
    assert!(matches!(err, ChainError::EmptyContextError));
}

// ---- cancellation and deadline ----

#[tokio::test]
async fn cancelled_chain_dispatches_nothing_and_reports_every_sub_request() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let chain = orchestrator(model.clone(), 10_000, ChainStrategy::map_reduce(2));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = chain.execute_with_cancel(&four_chunks(), &query(), cancel).await.unwrap();

    assert!(result.partial);
    assert!(result.answer.is_empty());
    let mut expected: Vec<String> = [A, B, C, D].iter().map(|id| format!("map:{id}")).collect();
    expected.push("reduce".into());
    assert_eq!(result.failed, expected);
    assert_eq!(model.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_stuff_returns_partial_result() {
    let model = Arc::new(ScriptedModel::new(vec![("STUFF", Reply::Hang)]));
    let chain = orchestrator(model, 10_000, ChainStrategy::stuff());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = chain.execute_with_cancel(&four_chunks(), &query(), cancel).await.unwrap();
    assert!(result.partial);
    assert_eq!(result.failed, vec!["stuff".to_string()]);
    assert!(result.citations.is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_refinement_and_keeps_last_answer() {
    let step = Duration::from_secs(10);
    let model = Arc::new(ScriptedModel::new(vec![
        ("gamma text", Reply::Delayed(step, "v3".into())),
        ("beta text", Reply::Delayed(step, "v2".into())),
        ("alpha text", Reply::Delayed(step, "v1".into())),
    ]));
    let dispatcher = Arc::new(Dispatcher::new(model, common::dispatch_config(10_000)).unwrap());
    let config = ChainConfig::new(ChainStrategy::refine())
        .with_templates(templates())
        .with_deadline(Duration::from_secs(25));
    let chain = ChainOrchestrator::new(dispatcher, config).unwrap();
    let retrieved = retrieval(&[
        (A, "alpha text about retrieval."),
        (B, "beta text about generation."),
        (C, "gamma text about chunking."),
    ]);

    let result = chain.execute(&retrieved, &query()).await.unwrap();

    assert_eq!(result.answer, "v2");
    assert!(result.partial);
    assert_eq!(result.failed, vec![format!("refine:{C}")]);
}

// ---- observability ----

#[tokio::test]
async fn state_transitions_are_traced_inside_chain_span() {
    let capture = SpanCapture::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let _default = tracing::subscriber::set_default(subscriber);

    let model = Arc::new(ScriptedModel::new(map_rules(Reply::text("summary of beta"))));
    let chain = orchestrator(model, 10_000, ChainStrategy::map_reduce(2));
    chain.execute(&four_chunks(), &query()).await.unwrap();

    let states: Vec<String> = capture
        .events_in("chain.execute")
        .iter()
        .filter_map(|e| e.str_field("state").map(str::to_string))
        .collect();
    assert_eq!(states, vec!["mapping", "reducing", "done"]);

    let spans = capture.spans_named("chain.execute");
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].field("strategy"), Some(&serde_json::json!("map_reduce")));
    assert_eq!(spans[0].field("chunks"), Some(&serde_json::json!(4)));
}

#[test]
fn invalid_chain_config_is_rejected_up_front() {
    let model = Arc::new(ScriptedModel::new(vec![]));
    let dispatcher = Arc::new(Dispatcher::new(model, common::dispatch_config(100)).unwrap());
    let err = ChainOrchestrator::new(dispatcher, ChainConfig::new(ChainStrategy::map_reduce(0))).unwrap_err();
    assert!(matches!(err, ChainError::ConfigError(_)));
}
