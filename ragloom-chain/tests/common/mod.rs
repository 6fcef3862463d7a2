//! Deterministic generation models and fixtures shared by the chain tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ragloom_chain::{
    ChainConfig, ChainOrchestrator, ChainStrategy, DispatchConfig, Dispatcher, GenerationError,
    GenerationModel, GenerationParams, PromptTemplates, RetryPolicy,
};
use ragloom_rag::{Chunk, Metadata, RetrievalResult, SearchResult};

/// What a stub model does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(GenerationError),
    /// Never completes; only a timeout or cancellation ends the call.
    Hang,
    Delayed(Duration, String),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    async fn play(self) -> Result<String, GenerationError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
            Reply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

/// Replies by the first rule whose marker occurs in the prompt.
pub struct ScriptedModel {
    rules: Vec<(String, Reply)>,
    fallback: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(rules: Vec<(&str, Reply)>) -> Self {
        Self {
            rules: rules.into_iter().map(|(m, r)| (m.to_string(), r)).collect(),
            fallback: Reply::text("ok"),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.fallback.clone());
        reply.play().await
    }
}

/// Plays replies in order, then answers `"done"`.
pub struct SequenceModel {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<usize>,
}

impl SequenceModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self { replies: Mutex::new(replies.into()), calls: Mutex::new(0) }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl GenerationModel for SequenceModel {
    fn name(&self) -> &str {
        "sequence"
    }

    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, GenerationError> {
        *self.calls.lock().unwrap() += 1;
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_else(|| Reply::text("done"));
        reply.play().await
    }
}

/// Holds every map call open for `delay` while tracking how many are in flight.
/// Reduce prompts are answered immediately.
pub struct ConcurrencyModel {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyModel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Highest number of simultaneous map calls observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationModel for ConcurrencyModel {
    fn name(&self) -> &str {
        "concurrency"
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.starts_with("REDUCE") {
            return Ok("combined".to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("partial".to_string())
    }
}

/// Compact templates that make each request kind easy to recognise.
pub fn templates() -> PromptTemplates {
    PromptTemplates {
        stuff: "STUFF\n{context}\nQ: {question}".into(),
        map: "MAP\n{context}\nQ: {question}".into(),
        reduce: "REDUCE\n{summaries}\nQ: {question}".into(),
        refine_initial: "INIT\n{context}\nQ: {question}".into(),
        refine_step: "STEP\n{answer}\n{context}\nQ: {question}".into(),
    }
}

pub fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        document_id: id.split('#').next().unwrap_or(id).to_string(),
        text: text.to_string(),
        start: 0,
        end: text.len(),
        metadata: Metadata::new(),
    }
}

/// A retrieval result in the given (relevance) order.
pub fn retrieval(chunks: &[(&str, &str)]) -> RetrievalResult {
    let hits = chunks
        .iter()
        .enumerate()
        .map(|(rank, (id, text))| SearchResult { chunk: chunk(id, text), score: 1.0 - rank as f32 * 0.1 })
        .collect();
    RetrievalResult::new(hits)
}

pub fn dispatch_config(window: usize) -> DispatchConfig {
    DispatchConfig {
        context_window: window,
        timeout: Duration::from_secs(30),
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        },
        ..Default::default()
    }
}

pub fn orchestrator(
    model: Arc<dyn GenerationModel>,
    window: usize,
    strategy: ChainStrategy,
) -> ChainOrchestrator {
    let dispatcher = Arc::new(Dispatcher::new(model, dispatch_config(window)).unwrap());
    ChainOrchestrator::new(dispatcher, ChainConfig::new(strategy).with_templates(templates())).unwrap()
}
