//! # RAG Chain Example
//!
//! Indexes a few documents, retrieves for a question, and answers it with
//! each chain strategy: stuff, map-reduce and refine.
//!
//! Uses a deterministic bag-of-words embedder and an extractive stand-in
//! model, so it runs with **zero API keys**.
//!
//! Run: `cargo run --example rag_chain`
//! Verbose: `RUST_LOG=ragloom_chain=debug cargo run --example rag_chain`

use std::sync::Arc;

use async_trait::async_trait;
use ragloom_chain::{
    ChainConfig, ChainOrchestrator, ChainStrategy, DispatchConfig, Dispatcher, GenerationError,
    GenerationModel, GenerationParams,
};
use ragloom_rag::{
    Boundary, DistanceMetric, Document, EmbeddingProvider, Indexer, InMemoryVectorStore,
    KeywordOverlapReranker, RagConfig, Retriever, TextChunker,
};
use ragloom_telemetry::{TelemetryConfig, init_telemetry};
use tracing::info;

const DIMENSIONS: usize = 64;

// ---------------------------------------------------------------------------
// HashingEmbedder: each word bumps one hashed dimension
// ---------------------------------------------------------------------------

struct HashingEmbedder;

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> ragloom_rag::Result<Vec<f32>> {
        let mut vector = vec![0.0f32; DIMENSIONS];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            vector[(hash % DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

// ---------------------------------------------------------------------------
// ExtractiveModel: answers with the first sentence of each source
// ---------------------------------------------------------------------------

struct ExtractiveModel;

#[async_trait]
impl GenerationModel for ExtractiveModel {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        let mut lines = prompt.lines();
        let mut picked = Vec::new();
        while let Some(line) = lines.next() {
            if line.starts_with("[source:") {
                if let Some(body) = lines.next() {
                    let sentence = body.split_inclusive('.').next().unwrap_or(body);
                    picked.push(sentence.trim().to_string());
                }
            }
        }
        if picked.is_empty() {
            return Err(GenerationError::ModelError("prompt carried no sources".into()));
        }
        Ok(picked.join(" "))
    }
}

fn documents() -> Vec<Document> {
    vec![
        Document::new(
            "rag-intro",
            "Retrieval-augmented generation grounds a language model in retrieved documents. \
             The retriever finds relevant chunks and the generator writes an answer from them.",
        )
        .with_metadata("topic", "rag"),
        Document::new(
            "chunking",
            "Chunking splits documents into overlapping fragments. \
             Overlap keeps sentences that straddle a boundary retrievable from either side.",
        )
        .with_metadata("topic", "rag"),
        Document::new(
            "vectors",
            "Vector stores rank chunks by cosine similarity between embeddings. \
             Filters on metadata narrow the candidates before ranking.",
        )
        .with_metadata("topic", "search"),
        Document::new(
            "pasta",
            "Cook pasta in salted boiling water. Drain it a minute before the package says.",
        )
        .with_metadata("topic", "cooking"),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::default())?;

    // -- 1. Index -----------------------------------------------------------
    let config = RagConfig::builder()
        .chunk_size(160)
        .chunk_overlap(20)
        .boundary(Boundary::Sentence)
        .top_k(3)
        .build()?;

    let embedder = Arc::new(HashingEmbedder);
    let store = Arc::new(InMemoryVectorStore::new(DIMENSIONS, DistanceMetric::Cosine));
    let indexer = Indexer::builder()
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .chunker(Arc::new(TextChunker::new(config.chunking.clone())?))
        .build()?;
    let chunks = indexer.index_batch(&documents()).await?;
    info!(chunk_count = chunks.len(), "Indexed demo documents");
    println!("Indexed {} chunks", chunks.len());

    // -- 2. Retrieve ----------------------------------------------------------
    let retriever = Retriever::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(store)
        .reranker(Arc::new(KeywordOverlapReranker::default()))
        .build()?;

    let query = retriever.query("How does retrieval-augmented generation use chunks?").with_rerank();
    let retrieval = retriever.retrieve(&query).await?;
    println!("\nRetrieved:");
    for hit in &retrieval.hits {
        println!("  {:.3}  {}", hit.score, hit.chunk.id);
    }

    // -- 3. Answer with each strategy ----------------------------------------
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(ExtractiveModel), DispatchConfig::default())?);
    for strategy in [ChainStrategy::stuff(), ChainStrategy::map_reduce(2), ChainStrategy::refine()] {
        let name = strategy.name();
        let chain = ChainOrchestrator::new(dispatcher.clone(), ChainConfig::new(strategy))?;
        info!(strategy = name, chunks = retrieval.len(), "Running chain");
        let result = chain.execute(&retrieval, &query).await?;
        info!(
            strategy = name,
            citations = result.citations.len(),
            partial = result.partial,
            "Chain finished"
        );

        println!("\n[{name}] {}", result.answer);
        println!("  citations: {:?}", result.citations);
        if result.partial {
            println!("  partial, failed: {:?}", result.failed);
        }
        if !result.dropped.is_empty() {
            println!("  dropped for budget: {:?}", result.dropped);
        }
    }

    Ok(())
}
