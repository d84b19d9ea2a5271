//! Core data models that flow through the query pipeline.
//!
//! A [`SourceDocument`] is produced by the loader for every selected file,
//! split into [`Chunk`]s, and dropped once the index is built. An [`Answer`]
//! and its [`TranscriptEntry`] live for exactly one turn.

use chrono::{DateTime, Local};

/// Timestamp layout used in transcript lines (`2024/05/01-13:45:09`).
pub const TRANSCRIPT_TIME_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// A selected file's text, keyed by its snapshot-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path relative to the snapshot root, `/`-separated.
    pub path: String,
    /// File extension including the leading dot (`".rs"`), empty if none.
    pub extension: String,
    pub body: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        Self {
            path,
            extension,
            body: body.into(),
        }
    }
}

fn extension_of(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(0) | None => String::new(),
        Some(pos) => file_name[pos..].to_string(),
    }
}

/// A unit of indexed text derived from exactly one [`SourceDocument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identity: `"<path>#<chunk_index>"`.
    pub id: String,
    /// Path of the parent document.
    pub path: String,
    pub chunk_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(path: &str, chunk_index: usize, text: impl Into<String>) -> Self {
        Self {
            id: format!("{}#{}", path, chunk_index),
            path: path.to_string(),
            chunk_index,
            text: text.into(),
        }
    }
}

/// A generated answer and the paths of the chunks that grounded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Completion text exactly as the model returned it.
    pub text: String,
    pub sources: Vec<String>,
}

impl Answer {
    /// The answer with embedded newlines removed, as displayed and logged.
    pub fn display_text(&self) -> String {
        strip_newlines(&self.text)
    }
}

/// One completed turn, as appended to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Local>,
    pub query: String,
    pub answer: String,
}

impl TranscriptEntry {
    pub fn new(timestamp: DateTime<Local>, query: &str, answer: &str) -> Self {
        Self {
            timestamp,
            query: strip_newlines(query),
            answer: strip_newlines(answer),
        }
    }

    /// Render the entry as a single transcript line (no trailing newline).
    ///
    /// ```text
    /// Q:, 2024/05/01-13:45:09, what does main do?, A:, It parses flags.
    /// ```
    pub fn to_line(&self) -> String {
        format!(
            "Q:, {}, {}, A:, {}",
            self.timestamp.format(TRANSCRIPT_TIME_FORMAT),
            strip_newlines(&self.query),
            strip_newlines(&self.answer)
        )
    }
}

/// Remove `\n` and `\r` characters without touching other whitespace.
pub fn strip_newlines(text: &str) -> String {
    text.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_extension_detection() {
        assert_eq!(SourceDocument::new("src/main.rs", "").extension, ".rs");
        assert_eq!(SourceDocument::new("docs/a.b/README", "").extension, "");
        assert_eq!(SourceDocument::new(".gitignore", "").extension, "");
        assert_eq!(SourceDocument::new("a/archive.tar.gz", "").extension, ".gz");
    }

    #[test]
    fn test_chunk_identity() {
        let c = Chunk::new("src/lib.rs", 2, "text");
        assert_eq!(c.id, "src/lib.rs#2");
        assert_eq!(c.path, "src/lib.rs");
    }

    #[test]
    fn test_transcript_line_format() {
        let ts = Local.with_ymd_and_hms(2024, 5, 1, 13, 45, 9).unwrap();
        let entry = TranscriptEntry::new(ts, "what\ndoes it do?", "It\r\nparses flags.");
        assert_eq!(
            entry.to_line(),
            "Q:, 2024/05/01-13:45:09, whatdoes it do?, A:, Itparses flags."
        );
    }

    #[test]
    fn test_answer_display_text() {
        let answer = Answer {
            text: " First line.\nSecond line.\n".to_string(),
            sources: vec![],
        };
        assert_eq!(answer.display_text(), " First line.Second line.");
    }
}
