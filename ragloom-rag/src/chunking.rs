//! Document chunking.
//!
//! [`TextChunker`] splits a document into fragments of at most
//! `max_size` characters. Consecutive fragments share exactly `overlap`
//! characters, so concatenating the fragments with the overlaps removed
//! reproduces the source text. Split points are chosen at the configured
//! [`Boundary`]; when a window contains no such point the splitter falls
//! back to the next finer one (paragraph, sentence, word, character).

use crate::config::{Boundary, ChunkerConfig};
use crate::document::{Chunk, Document, MetadataValue};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no vectors.
/// Vectors are attached later by the [`Indexer`](crate::Indexer).
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in document order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Split `document` according to `config`.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if the
/// config is invalid (for example `overlap >= max_size`).
pub fn chunk(document: &Document, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    Ok(TextChunker::new(config.clone())?.chunk(document))
}

/// Splits text under a [`ChunkerConfig`] size policy.
///
/// Chunk IDs are generated with [`Chunk::make_id`] from the byte offset of the
/// chunk start. Each chunk inherits the parent document's metadata plus a
/// `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use ragloom_rag::{Boundary, ChunkerConfig, TextChunker};
///
/// let chunker = TextChunker::new(ChunkerConfig::new(256, 32, Boundary::Sentence)?)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    /// Create a chunker, validating the config up front.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

/// Strength of a split point: higher ranks satisfy coarser boundaries.
const RANK_CHAR: u8 = 0;
const RANK_WORD: u8 = 1;
const RANK_SENTENCE: u8 = 2;
const RANK_PARAGRAPH: u8 = 3;

fn required_rank(boundary: Boundary) -> u8 {
    match boundary {
        Boundary::Char => RANK_CHAR,
        Boundary::Sentence => RANK_SENTENCE,
        Boundary::Paragraph => RANK_PARAGRAPH,
    }
}

/// Rank every char position `p` (a split before `chars[p]`).
///
/// Word, sentence, and paragraph splits sit at the start of a non-whitespace run, so
/// the whitespace stays with the preceding fragment.
fn split_ranks(chars: &[char]) -> Vec<u8> {
    let mut ranks = vec![RANK_CHAR; chars.len() + 1];
    for p in 1..chars.len() {
        if !chars[p - 1].is_whitespace() || chars[p].is_whitespace() {
            continue;
        }
        let mut q = p;
        let mut newlines = 0;
        while q > 0 && chars[q - 1].is_whitespace() {
            if chars[q - 1] == '\n' {
                newlines += 1;
            }
            q -= 1;
        }
        ranks[p] = if newlines >= 2 {
            RANK_PARAGRAPH
        } else if q > 0 && matches!(chars[q - 1], '.' | '!' | '?') {
            RANK_SENTENCE
        } else {
            RANK_WORD
        };
    }
    ranks
}

/// Last position in `lo..=hi` whose rank satisfies the boundary, falling back
/// to finer ranks before settling on a hard cut at `hi`.
fn find_split(ranks: &[u8], lo: usize, hi: usize, boundary: Boundary) -> usize {
    for rank in (RANK_CHAR..=required_rank(boundary)).rev() {
        if let Some(p) = (lo..=hi).rev().find(|&p| ranks[p] >= rank) {
            return p;
        }
    }
    hi
}

impl Chunker for TextChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let text = &document.text;
        let chars: Vec<char> = text.chars().collect();
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        let ranks = split_ranks(&chars);

        let n = chars.len();
        let ChunkerConfig { max_size, overlap, boundary } = self.config;
        let mut spans = Vec::new();
        let mut start = 0;
        loop {
            if n - start <= max_size {
                spans.push((start, n));
                break;
            }
            // end must leave room for the overlap so the next start advances
            let end = find_split(&ranks, start + overlap + 1, start + max_size, boundary);
            spans.push((start, end));
            start = end - overlap;
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(i, (s, e))| {
                let (start, end) = (offsets[s], offsets[e]);
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), MetadataValue::Integer(i as i64));
                Chunk {
                    id: Chunk::make_id(&document.id, start),
                    document_id: document.id.clone(),
                    text: text[start..end].to_string(),
                    start,
                    end,
                    metadata,
                }
            })
            .collect()
    }
}
