//! Query engine: localize → embed → retrieve → augment → complete.
//!
//! A [`QueryEngine`] owns the built [`VectorIndex`] together with the
//! embedding and completion providers. [`QueryEngine::answer`] runs one turn;
//! every failure inside it surfaces as [`PipelineError::Query`], which the
//! session treats as recoverable.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::index::{Hit, VectorIndex};
use crate::models::{strip_newlines, Answer};

/// Default number of chunks retrieved per query.
pub const DEFAULT_TOP_K: usize = 4;

/// Upper bound on `top_k`, keeping the augmented prompt manageable.
pub const MAX_TOP_K: usize = 20;

/// Language the model is instructed to answer in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Language {
    #[default]
    Japanese,
    English,
}

impl Language {
    /// Parse `"ja"` / `"en"` (case-insensitive). Anything else falls back to
    /// the default, Japanese.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Language::English,
            _ => Language::Japanese,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Japanese => "ja",
            Language::English => "en",
        }
    }

    /// Instruction prefixed to every question.
    pub fn instruction(self) -> &'static str {
        match self {
            Language::Japanese => "日本語で答えてください",
            Language::English => "Please answer in English",
        }
    }

    /// Prefix the question with the language instruction.
    pub fn localize(self, query: &str) -> String {
        format!("{}: {}", self.instruction(), query)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Combine retrieved chunk text with the localized question.
pub fn build_prompt(hits: &[Hit<'_>], localized_query: &str) -> String {
    let context = hits
        .iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_PREAMBLE, context, localized_query
    )
}

pub struct QueryEngine {
    index: VectorIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Box<dyn CompletionProvider>,
    language: Language,
    top_k: usize,
}

impl QueryEngine {
    /// `top_k` is clamped to `1..=MAX_TOP_K`.
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Box<dyn CompletionProvider>,
        language: Language,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            completer,
            language,
            top_k: top_k.clamp(1, MAX_TOP_K),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Answer one question. Newlines in the raw query are removed before it
    /// is localized.
    pub async fn answer(&self, raw_query: &str) -> Result<Answer> {
        let localized = self.language.localize(&strip_newlines(raw_query));

        let query_vec = self
            .embedder
            .embed_one(&localized)
            .await
            .context("embedding query")
            .map_err(PipelineError::Query)?;

        let hits = self.index.search(&query_vec, self.top_k);
        debug!(
            hits = hits.len(),
            top = hits.first().map(|h| h.chunk.id.as_str()).unwrap_or("-"),
            "retrieved context"
        );

        let prompt = build_prompt(&hits, &localized);
        let text = self
            .completer
            .complete(&prompt)
            .await
            .context("generating answer")
            .map_err(PipelineError::Query)?;

        let mut sources: Vec<String> = Vec::with_capacity(hits.len());
        for hit in &hits {
            if !sources.contains(&hit.chunk.path) {
                sources.push(hit.chunk.path.clone());
            }
        }

        Ok(Answer { text, sources })
    }
}
