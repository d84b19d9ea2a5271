//! Pipeline bootstrap: materialize → load → chunk → embed → query engine.
//!
//! [`Pipeline::start`] runs the `Idle → Indexing → Ready` part of the session
//! lifecycle. Every failure here is fatal and is reported with its
//! [`PipelineError`] kind; the front ends turn the returned [`Pipeline`] into
//! a [`Session`] for the question loop.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use repo_chat_core::chunk::chunk_all_capped;
use repo_chat_core::completion::CompletionProvider;
use repo_chat_core::embedding::EmbeddingProvider;
use repo_chat_core::engine::QueryEngine;
use repo_chat_core::error::{PipelineError, Result};
use repo_chat_core::index::{build_index_with, BatchLimits, VectorIndex};
use repo_chat_core::session::{Session, SessionState, TranscriptSink};

use crate::completion::OpenAICompleter;
use crate::config::{resolve_api_key, Config};
use crate::embedding::OpenAIEmbedder;
use crate::loader::load_documents;
use crate::materialize::{materialize, RepositorySnapshot};

/// The embedding and completion backends used for one session.
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub completer: Box<dyn CompletionProvider>,
}

impl Providers {
    /// OpenAI clients using the key named by `provider.api_key_env`.
    pub fn openai(config: &Config) -> Result<Self> {
        let api_key = resolve_api_key(&config.provider)?;
        let embedder = OpenAIEmbedder::new(&config.embedding, &config.provider, api_key.clone())
            .map_err(|e| PipelineError::Configuration(format!("embedding client: {:#}", e)))?;
        let completer = OpenAICompleter::new(&config.completion, &config.provider, api_key)
            .map_err(|e| PipelineError::Configuration(format!("completion client: {:#}", e)))?;
        Ok(Self {
            embedder: Arc::new(embedder),
            completer: Box::new(completer),
        })
    }
}

pub struct Pipeline {
    pub snapshot: RepositorySnapshot,
    pub engine: QueryEngine,
}

impl Pipeline {
    pub async fn start(config: &Config, providers: Providers) -> Result<Self> {
        info!(state = ?SessionState::Idle, "starting pipeline");
        let snapshot = materialize(&config.repository).await?;

        info!(state = ?SessionState::Indexing, "building index");
        let index = index_snapshot(config, &snapshot, providers.embedder.as_ref()).await?;

        let engine = QueryEngine::new(
            index,
            providers.embedder,
            providers.completer,
            config.answer.language(),
            config.retrieval.top_k,
        );
        info!(
            state = ?SessionState::Ready,
            chunks = engine.index().len(),
            language = %engine.language(),
            top_k = engine.top_k(),
            "ready for questions"
        );
        Ok(Self { snapshot, engine })
    }

    pub fn into_session<S: TranscriptSink>(self, transcript: S) -> Session<S> {
        Session::new(self.engine, transcript)
    }
}

/// Load, chunk and embed the selected files of a snapshot.
pub async fn index_snapshot(
    config: &Config,
    snapshot: &RepositorySnapshot,
    embedder: &dyn EmbeddingProvider,
) -> Result<VectorIndex> {
    let selector = config.filter.selector();
    let documents = load_documents(&snapshot.path, &selector, config.loader.on_undecodable)
        .context("loading documents")
        .map_err(PipelineError::IndexBuild)?;
    let chunks = chunk_all_capped(
        &documents,
        config.chunking.policy(),
        config.embedding.max_input_chars,
    );
    info!(
        documents = documents.len(),
        chunks = chunks.len(),
        extensions = ?selector.extensions,
        dirs = ?selector.fragments,
        "selected corpus"
    );
    let limits = BatchLimits {
        max_items: config.embedding.batch_size,
        max_chars: config.embedding.max_batch_chars,
    };
    build_index_with(embedder, chunks, limits).await
}
