//! The sequential query/answer loop.
//!
//! ```text
//! Idle ─▶ Indexing ─▶ Ready ⇄ Answering
//!                       │
//!                       └─ "exit" ─▶ Terminated
//! ```
//!
//! `Idle` and `Indexing` belong to the pipeline bootstrap in the application
//! crate; a [`Session`] is created once the index exists and starts in
//! `Ready`. Each call to [`Session::submit`] runs at most one turn to
//! completion before returning, so turns are strictly ordered. A completed
//! turn appends one [`TranscriptEntry`]; a failed turn appends nothing and
//! leaves the session `Ready`.

use anyhow::Result;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::engine::QueryEngine;
use crate::error::PipelineError;
use crate::models::{Answer, TranscriptEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Indexing,
    Ready,
    Answering,
    Terminated,
}

/// Append-only destination for transcript entries.
pub trait TranscriptSink: Send {
    fn append(&mut self, entry: &TranscriptEntry) -> Result<()>;
}

/// Keeps rendered transcript lines in memory.
#[derive(Debug, Default)]
pub struct MemoryTranscript {
    lines: Vec<String>,
}

impl MemoryTranscript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl TranscriptSink for MemoryTranscript {
    fn append(&mut self, entry: &TranscriptEntry) -> Result<()> {
        self.lines.push(entry.to_line());
        Ok(())
    }
}

/// Result of submitting one input line.
#[derive(Debug)]
pub enum Turn {
    /// Blank input; nothing happened.
    Ignored,
    /// The exit token was received; the session is now terminated.
    Exit,
    /// The session was already terminated; the input was not read.
    Closed,
    Answered(Answer),
    /// The turn failed; the session is back in `Ready`.
    Failed(PipelineError),
}

pub struct Session<S: TranscriptSink> {
    engine: QueryEngine,
    transcript: S,
    state: SessionState,
    clock: fn() -> DateTime<Local>,
}

impl<S: TranscriptSink> Session<S> {
    pub fn new(engine: QueryEngine, transcript: S) -> Self {
        Self {
            engine,
            transcript,
            state: SessionState::Ready,
            clock: Local::now,
        }
    }

    /// Replace the timestamp source used for transcript entries.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn transcript(&self) -> &S {
        &self.transcript
    }

    /// Whether `line` is the exit token (`exit`, any case, surrounding
    /// whitespace ignored).
    pub fn is_exit(line: &str) -> bool {
        line.trim().eq_ignore_ascii_case("exit")
    }

    /// Process one input line.
    pub async fn submit(&mut self, line: &str) -> Turn {
        if self.state == SessionState::Terminated {
            return Turn::Closed;
        }
        if Self::is_exit(line) {
            self.terminate();
            return Turn::Exit;
        }
        let query = line.trim();
        if query.is_empty() {
            return Turn::Ignored;
        }

        self.state = SessionState::Answering;
        let outcome = self.engine.answer(query).await;
        self.state = SessionState::Ready;

        match outcome {
            Ok(answer) => {
                let entry = TranscriptEntry::new((self.clock)(), query, &answer.display_text());
                if let Err(e) = self.transcript.append(&entry) {
                    warn!(error = %format!("{:#}", e), "failed to append transcript entry");
                }
                Turn::Answered(answer)
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                Turn::Failed(e)
            }
        }
    }

    /// Move to `Terminated`; later submissions return [`Turn::Closed`].
    pub fn terminate(&mut self) {
        if self.state != SessionState::Terminated {
            info!("session terminated");
            self.state = SessionState::Terminated;
        }
    }

    /// Consume the session, returning its transcript sink.
    pub fn into_transcript(self) -> S {
        self.transcript
    }
}
