//! Deterministic provider doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::completion::CompletionProvider;
use crate::embedding::EmbeddingProvider;

const VOCAB_DIMS: usize = 256;

/// Bag-of-words embedder: each distinct lowercase word gets its own axis.
#[derive(Default)]
pub struct KeywordEmbedder {
    vocab: Mutex<Vec<String>>,
}

impl KeywordEmbedder {
    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vocab = self.vocab.lock().unwrap();
        let mut v = vec![0.0; VOCAB_DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let axis = match vocab.iter().position(|w| *w == word) {
                Some(i) => i,
                None => {
                    vocab.push(word);
                    vocab.len() - 1
                }
            };
            v[axis % VOCAB_DIMS] += 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing-test"
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unavailable")
    }
}

/// Replays scripted results and records every prompt it receives.
#[derive(Default)]
pub struct ScriptedCompleter {
    replies: Mutex<VecDeque<Result<String>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCompleter {
    pub fn new(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Arc::default(),
        }
    }

    /// Handle to the prompts received so far; stays valid after the
    /// completer is boxed into an engine.
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }

    pub fn always(reply: &str) -> Self {
        Self::new((0..16).map(|_| Ok(reply.to_string())).collect())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompleter {
    fn model_name(&self) -> &str {
        "scripted-test"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => bail!("no scripted reply left"),
        }
    }
}
