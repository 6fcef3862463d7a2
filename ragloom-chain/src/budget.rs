//! Prompt cost functions.
//!
//! The chain only compares cumulative prompt cost against a limit, so the
//! unit is pluggable: characters, whitespace-separated words, or any
//! tokenizer wrapped in a closure.

/// Measures how much of a context window a piece of text consumes.
pub trait CostFunction: Send + Sync {
    fn cost(&self, text: &str) -> usize;
}

/// Cost in Unicode scalar values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCount;

impl CostFunction for CharCount {
    fn cost(&self, text: &str) -> usize {
        text.chars().count()
    }
}

/// Cost in whitespace-separated words.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCount;

impl CostFunction for WordCount {
    fn cost(&self, text: &str) -> usize {
        text.split_whitespace().count()
    }
}

impl<F> CostFunction for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn cost(&self, text: &str) -> usize {
        self(text)
    }
}
