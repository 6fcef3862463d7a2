//! Prompt templates for the chain strategies.
//!
//! Templates use `{name}` placeholders. Rendering is a single pass over the
//! template, so placeholder-like text inside chunk content is never expanded.

use ragloom_rag::Chunk;
use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};

/// The prompts used by each strategy.
///
/// | template         | placeholders                        |
/// |------------------|-------------------------------------|
/// | `stuff`          | `{context}`, `{question}`           |
/// | `map`            | `{context}`, `{question}`           |
/// | `reduce`         | `{summaries}`, `{question}`         |
/// | `refine_initial` | `{context}`, `{question}`           |
/// | `refine_step`    | `{answer}`, `{context}`, `{question}` |
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PromptTemplates {
    pub stuff: String,
    pub map: String,
    pub reduce: String,
    pub refine_initial: String,
    pub refine_step: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            stuff: "Use the following sources to answer the question. \
                    Cite sources by their id.\n\n{context}\n\nQuestion: {question}\nAnswer:"
                .into(),
            map: "Extract the information relevant to the question from this source. \
                  If nothing is relevant, say so.\n\n{context}\n\nQuestion: {question}\nRelevant information:"
                .into(),
            reduce: "Combine the following partial answers into one final answer. \
                     Cite sources by their id.\n\n{summaries}\n\nQuestion: {question}\nAnswer:"
                .into(),
            refine_initial: "Answer the question using this source.\n\n{context}\n\nQuestion: {question}\nAnswer:"
                .into(),
            refine_step: "Here is an existing answer:\n{answer}\n\n\
                          Refine it using the additional source below if it is relevant; \
                          otherwise repeat the existing answer.\n\n{context}\n\nQuestion: {question}\nRefined answer:"
                .into(),
        }
    }
}

impl PromptTemplates {
    /// Check that each template carries the placeholders its strategy fills.
    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str, &[&str]); 5] = [
            ("stuff", &self.stuff, &["context", "question"]),
            ("map", &self.map, &["context", "question"]),
            ("reduce", &self.reduce, &["summaries", "question"]),
            ("refine_initial", &self.refine_initial, &["context", "question"]),
            ("refine_step", &self.refine_step, &["answer", "context", "question"]),
        ];
        for (name, template, placeholders) in required {
            for placeholder in placeholders {
                if !template.contains(&format!("{{{placeholder}}}")) {
                    return Err(ChainError::ConfigError(format!(
                        "template '{name}' is missing the {{{placeholder}}} placeholder"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Substitute `{name}` placeholders from `values`. Unknown placeholders are kept verbatim.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            values.iter().find(|(k, _)| *k == name).map(|(_, v)| (*v, close))
        });
        match substituted {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Format one chunk as a citable source block.
pub fn format_source(chunk: &Chunk) -> String {
    format!("[source: {}]\n{}", chunk.id, chunk.text)
}

/// Join chunks into a context block, separated by blank lines.
pub fn format_sources<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    chunks.into_iter().map(format_source).collect::<Vec<_>>().join("\n\n")
}

/// Format a partial answer attributed to the chunk it came from.
pub fn format_partial(chunk_id: &str, text: &str) -> String {
    format!("[source: {chunk_id}]\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_single_pass() {
        let out = render("Q: {question}\nC: {context}", &[
            ("question", "what is {context}?"),
            ("context", "ctx"),
        ]);
        assert_eq!(out, "Q: what is {context}?\nC: ctx");
    }

    #[test]
    fn render_keeps_unknown_and_unbalanced_braces() {
        assert_eq!(render("{x} {y", &[("z", "1")]), "{x} {y");
        assert_eq!(render("a{b}c", &[("b", "")]), "ac");
    }

    #[test]
    fn default_templates_are_valid() {
        PromptTemplates::default().validate().unwrap();
    }

    #[test]
    fn missing_placeholder_is_config_error() {
        let templates = PromptTemplates { reduce: "no slots".into(), ..Default::default() };
        assert!(matches!(templates.validate(), Err(ChainError::ConfigError(_))));
    }
}
