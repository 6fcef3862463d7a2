//! Reranker trait for re-scoring an oversampled candidate pool.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// A pairwise relevance scorer, typically a cross-encoder.
///
/// Implementations only need [`score`](Reranker::score); the default
/// [`rerank`](Reranker::rerank) scores every candidate and re-sorts by
/// descending score with ties broken by ascending chunk id.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// A short name used in logs and errors.
    fn name(&self) -> &str;

    /// Score how relevant `candidate` is to `query`. Higher is more relevant.
    async fn score(&self, query: &str, candidate: &str) -> Result<f32>;

    /// Re-score and reorder `results` for `query`.
    async fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        let mut rescored = Vec::with_capacity(results.len());
        for mut result in results {
            result.score = self.score(query, &result.chunk.text).await?;
            rescored.push(result);
        }
        rescored.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        Ok(rescored)
    }
}

/// Scores candidates by the fraction of query terms they contain.
///
/// Terms are lowercased alphanumeric words longer than `min_term_len`
/// characters. Deterministic and model-free.
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_rag::KeywordOverlapReranker;
///
/// let reranker = KeywordOverlapReranker::new(3);
/// let score = reranker.score("rust ownership rules", "Ownership in Rust...").await?;
/// ```
#[derive(Debug, Clone)]
pub struct KeywordOverlapReranker {
    min_term_len: usize,
}

impl KeywordOverlapReranker {
    pub fn new(min_term_len: usize) -> Self {
        Self { min_term_len }
    }
}

fn terms(text: &str, min_len: usize) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > min_len)
        .map(str::to_lowercase)
        .collect()
}

impl Default for KeywordOverlapReranker {
    fn default() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl Reranker for KeywordOverlapReranker {
    fn name(&self) -> &str {
        "keyword_overlap"
    }

    async fn score(&self, query: &str, candidate: &str) -> Result<f32> {
        let query_terms = terms(query, self.min_term_len);
        if query_terms.is_empty() {
            return Ok(0.0);
        }
        let candidate_terms = terms(candidate, self.min_term_len);
        let hits = query_terms.intersection(&candidate_terms).count();
        Ok(hits as f32 / query_terms.len() as f32)
    }
}
