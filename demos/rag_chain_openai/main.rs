//! # RAG Chain with OpenAI-compatible endpoints
//!
//! Same flow as `rag_chain`, but embeddings and generation go over HTTP.
//! Works against OpenAI or any server speaking the same API (Ollama, vLLM).
//!
//! ```text
//! OPENAI_API_KEY=sk-... cargo run --example rag_chain_openai --features openai
//! OPENAI_BASE_URL=http://localhost:11434/v1 CHAT_MODEL=llama3.1 EMBED_MODEL=nomic-embed-text EMBED_DIMENSIONS=768 ...
//! ```

use std::sync::Arc;
use std::time::Duration;

use ragloom_chain::{
    ChainConfig, ChainOrchestrator, ChainStrategy, DispatchConfig, Dispatcher, OpenAIChatModel,
    RetryPolicy,
};
use ragloom_rag::{
    DistanceMetric, Document, EmbeddingProvider, Indexer, InMemoryVectorStore,
    OpenAIEmbeddingProvider, Retriever, TextChunker,
};
use ragloom_telemetry::{TelemetryConfig, init_telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig {
        default_directive: "info,ragloom_chain=debug".into(),
        ..Default::default()
    })?;

    let mut embedder = OpenAIEmbeddingProvider::from_env()?;
    let mut model = OpenAIChatModel::from_env()?;
    if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
        embedder = embedder.with_base_url(&base_url);
        model = model.with_base_url(base_url);
    }
    if let Ok(name) = std::env::var("EMBED_MODEL") {
        embedder = embedder.with_model(name);
    }
    if let Ok(dims) = std::env::var("EMBED_DIMENSIONS") {
        embedder = embedder.with_dimensions(dims.parse()?);
    }
    if let Ok(name) = std::env::var("CHAT_MODEL") {
        model = model.with_model(name);
    }
    let embedder = Arc::new(embedder);

    let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions(), DistanceMetric::Cosine));
    let indexer = Indexer::builder()
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .chunker(Arc::new(TextChunker::new(Default::default())?))
        .build()?;
    indexer
        .index_batch(&[
            Document::new(
                "rag",
                "Retrieval-augmented generation retrieves relevant passages and feeds them to a \
                 language model, which grounds its answer in them and can cite its sources.",
            ),
            Document::new(
                "map-reduce",
                "Map-reduce chains summarise each retrieved chunk independently, then combine \
                 the partial answers. They scale past the context window at the cost of more calls.",
            ),
            Document::new(
                "refine",
                "Refine chains build an answer chunk by chunk, revising the running answer with \
                 each new source. They are sequential but keep the most context per call.",
            ),
        ])
        .await?;

    let retriever = Retriever::builder().embedding_provider(embedder).vector_store(store).build()?;

    let dispatch = DispatchConfig {
        context_window: 24_000,
        timeout: Duration::from_secs(45),
        retry: RetryPolicy { max_attempts: 4, ..Default::default() },
        ..Default::default()
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(model), dispatch)?);
    let chain = ChainOrchestrator::new(
        dispatcher,
        ChainConfig::new(ChainStrategy::map_reduce(3)).with_deadline(Duration::from_secs(120)),
    )?;

    let query = retriever.query("When should I use map-reduce instead of refine?");
    info!(model = %chain.dispatcher().model_name(), "Answering with map-reduce chain");
    let result = chain.answer(&retriever, &query).await?;
    if result.partial {
        warn!(failed = ?result.failed, "Chain returned a partial answer");
    }

    println!("{}\n", result.answer);
    println!("Sources: {:?}", result.citations);
    if result.partial {
        println!("Incomplete; failed sub-requests: {:?}", result.failed);
    }
    Ok(())
}
