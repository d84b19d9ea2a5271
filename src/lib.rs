//! # repo-chat
//!
//! Retrieval-augmented question answering over one branch of a git
//! repository.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Materialize │──▶│ Load+Select │──▶│ Chunk+Embed  │──▶│  Query   │
//! │ git clone   │   │  walkdir    │   │ VectorIndex  │   │  Engine  │
//! └─────────────┘   └─────────────┘   └──────────────┘   └────┬─────┘
//!                                                             │
//!                                          ┌──────────────────┤
//!                                          ▼                  ▼
//!                                     ┌──────────┐      ┌──────────┐
//!                                     │   chat   │      │  stdio   │
//!                                     └──────────┘      └──────────┘
//! ```
//!
//! The I/O-free parts (selection, chunking, the index, the query engine and
//! the session state machine) live in the `repo-chat-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, CLI overrides, API key lookup |
//! | [`materialize`] | Fresh shallow clone of one branch |
//! | [`loader`] | Walk a snapshot and load selected files |
//! | [`embedding`] | OpenAI embeddings client |
//! | [`completion`] | OpenAI completions client |
//! | [`retry`] | HTTP retry with exponential backoff |
//! | [`pipeline`] | Bootstrap from config to a ready query engine |
//! | [`transcript`] | Per-session transcript file |
//! | [`chat`] | Interactive front end |
//! | [`stdio`] | Line protocol front end |

pub mod chat;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod loader;
pub mod materialize;
pub mod pipeline;
pub mod retry;
pub mod stdio;
pub mod transcript;
