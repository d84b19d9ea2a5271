//! File-backed transcript.
//!
//! One file per session, `chatlog_<YYYYMMDDHHMMSS>.txt`, named after the
//! session start time. Each completed turn appends one line and flushes.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use repo_chat_core::models::TranscriptEntry;
use repo_chat_core::session::TranscriptSink;

pub struct FileTranscript {
    path: PathBuf,
    file: File,
}

impl FileTranscript {
    /// Create `dir` if needed and open the transcript file for appending.
    pub fn create(dir: &Path, started: DateTime<Local>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create transcript directory: {}", dir.display()))?;
        let path = dir.join(file_name(started));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open transcript: {}", path.display()))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn file_name(started: DateTime<Local>) -> String {
    format!("chatlog_{}.txt", started.format("%Y%m%d%H%M%S"))
}

impl TranscriptSink for FileTranscript {
    fn append(&mut self, entry: &TranscriptEntry) -> Result<()> {
        writeln!(self.file, "{}", entry.to_line())?;
        self.file.flush()?;
        Ok(())
    }
}
