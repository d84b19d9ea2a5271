//! Immutable in-memory vector index.
//!
//! [`build_index`] embeds the complete chunk sequence in batches and returns a
//! [`VectorIndex`] only once every chunk has a vector; any provider failure
//! aborts the build. Retrieval is exact brute-force cosine similarity.
//!
//! Results are ordered by descending score with ties broken by insertion
//! order, so a fixed index and a fixed query vector always yield the same
//! ranking.

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{PipelineError, Result};
use crate::models::Chunk;

struct Entry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// A chunk returned from [`VectorIndex::search`].
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

pub struct VectorIndex {
    entries: Vec<Entry>,
    dims: usize,
}

impl VectorIndex {
    /// An index with no entries. Every search returns nothing.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            dims: 0,
        }
    }

    /// Assemble an index from chunks and their precomputed vectors.
    ///
    /// Fails when the counts differ or the vectors disagree on length.
    pub fn from_parts(chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> anyhow::Result<Self> {
        if chunks.len() != vectors.len() {
            anyhow::bail!(
                "embedding count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let dims = vectors.first().map_or(0, Vec::len);
        if let Some((i, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dims) {
            anyhow::bail!(
                "inconsistent embedding dimensions: chunk {} has {} dims, expected {}",
                chunks[i].id,
                v.len(),
                dims
            );
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| Entry { chunk, vector })
            .collect();
        Ok(Self { entries, dims })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, or 0 for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Return at most `k` chunks most similar to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Hit<'_>> {
        let mut hits: Vec<Hit<'_>> = self
            .entries
            .iter()
            .map(|e| Hit {
                chunk: &e.chunk,
                score: cosine_similarity(query, &e.vector),
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

/// Upper bounds for a single embedding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    /// Inputs per request.
    pub max_items: usize,
    /// Total text bytes per request. A single input larger than this is
    /// still sent, alone.
    pub max_chars: usize,
}

impl BatchLimits {
    pub fn items(max_items: usize) -> Self {
        Self {
            max_items,
            max_chars: usize::MAX,
        }
    }
}

/// Embed every chunk in batches of at most `batch_size` and build the index.
pub async fn build_index(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<Chunk>,
    batch_size: usize,
) -> Result<VectorIndex> {
    build_index_with(provider, chunks, BatchLimits::items(batch_size)).await
}

/// Embed every chunk and build the index.
///
/// The chunk sequence is consumed exactly once. Nothing is returned until
/// the whole corpus is embedded; an empty corpus yields an empty index
/// without calling the provider.
pub async fn build_index_with(
    provider: &dyn EmbeddingProvider,
    chunks: Vec<Chunk>,
    limits: BatchLimits,
) -> Result<VectorIndex> {
    if chunks.is_empty() {
        info!("no chunks selected; index is empty");
        return Ok(VectorIndex::empty());
    }

    let total = chunks.len();
    let mut vectors = Vec::with_capacity(total);

    for (n, batch) in batches(&chunks, limits).into_iter().enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = provider
            .embed(&texts)
            .await
            .with_context(|| format!("embedding batch {} ({} chunks)", n, texts.len()))
            .map_err(PipelineError::IndexBuild)?;
        if embedded.len() != texts.len() {
            return Err(PipelineError::IndexBuild(anyhow!(
                "provider returned {} vectors for {} inputs",
                embedded.len(),
                texts.len()
            )));
        }
        vectors.extend(embedded);
        debug!(done = vectors.len(), total, "embedded batch");
    }

    let index = VectorIndex::from_parts(chunks, vectors).map_err(PipelineError::IndexBuild)?;
    info!(
        chunks = index.len(),
        dims = index.dims(),
        model = provider.model_name(),
        "vector index built"
    );
    Ok(index)
}

/// Greedy split of `chunks` into consecutive, non-empty batches.
fn batches(chunks: &[Chunk], limits: BatchLimits) -> Vec<&[Chunk]> {
    let max_items = limits.max_items.max(1);
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = 0usize;
    for (i, chunk) in chunks.iter().enumerate() {
        let len = chunk.text.len();
        let full = i - start >= max_items || chars.saturating_add(len) > limits.max_chars;
        if i > start && full {
            out.push(&chunks[start..i]);
            start = i;
            chars = 0;
        }
        chars = chars.saturating_add(len);
    }
    if start < chunks.len() {
        out.push(&chunks[start..]);
    }
    out
}
