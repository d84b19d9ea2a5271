//! # repo-chat core
//!
//! Pure retrieval-augmented query logic for repo-chat: data models, the file
//! selector, chunking, the in-memory vector index, the query engine, and the
//! session loop.
//!
//! This crate performs no filesystem, process, or network I/O. Embedding and
//! completion backends plug in through the [`embedding::EmbeddingProvider`]
//! and [`completion::CompletionProvider`] traits, and transcripts are written
//! through [`session::TranscriptSink`]. The `repo-chat` application crate
//! supplies the concrete implementations.
//!
//! ```text
//! SourceDocument ──▶ chunk ──▶ build_index ──▶ VectorIndex
//!                                                  │
//!        query ──▶ Session ──▶ QueryEngine ◀───────┘
//!                     │            │
//!                     ▼            ▼
//!               TranscriptSink  CompletionProvider
//! ```

pub mod chunk;
pub mod completion;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod index;
pub mod models;
pub mod select;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
