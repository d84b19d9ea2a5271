//! Chunking policies.
//!
//! The default [`ChunkPolicy::WholeFile`] turns every document into exactly
//! one chunk. [`ChunkPolicy::Paragraph`] packs blank-line separated
//! paragraphs into chunks of at most `max_tokens × 4` characters and hard
//! splits paragraphs that are larger than that on their own.
//!
//! Either way, every chunk carries its parent document's path and a
//! contiguous `chunk_index` starting at 0.
//!
//! Embedding backends cap the size of a single input, so the pipeline uses
//! [`chunk_all_capped`], which keeps the policy but hard splits any chunk
//! larger than the cap.

use tracing::debug;

use crate::models::{Chunk, SourceDocument};

/// Rough characters-per-token ratio used to turn a token budget into a
/// character budget.
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChunkPolicy {
    #[default]
    WholeFile,
    Paragraph { max_tokens: usize },
}

/// Split one document into chunks according to `policy`.
///
/// Always yields at least one chunk for a non-empty document.
///
/// ```rust
/// use repo_chat_core::chunk::{chunk_document, ChunkPolicy};
/// use repo_chat_core::models::SourceDocument;
///
/// let doc = SourceDocument::new("README.md", "# Title\n\nBody.");
/// let chunks = chunk_document(&doc, ChunkPolicy::WholeFile);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].id, "README.md#0");
/// ```
pub fn chunk_document(doc: &SourceDocument, policy: ChunkPolicy) -> Vec<Chunk> {
    match policy {
        ChunkPolicy::WholeFile => vec![Chunk::new(&doc.path, 0, doc.body.clone())],
        ChunkPolicy::Paragraph { max_tokens } => {
            let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
            split_paragraphs(&doc.body, max_chars)
                .into_iter()
                .enumerate()
                .map(|(i, text)| Chunk::new(&doc.path, i, text))
                .collect()
        }
    }
}

/// Chunk every document in order, preserving document order in the output.
pub fn chunk_all(docs: &[SourceDocument], policy: ChunkPolicy) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, policy))
        .collect()
}

/// Like [`chunk_document`], but no chunk is longer than `max_chars` bytes.
///
/// Oversized chunks are hard split the same way oversized paragraphs are;
/// chunk indexes are renumbered so they stay contiguous.
pub fn chunk_document_capped(doc: &SourceDocument, policy: ChunkPolicy, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(CHARS_PER_TOKEN);
    let chunks = chunk_document(doc, policy);
    if chunks.iter().all(|c| c.text.len() <= max_chars) {
        return chunks;
    }

    let pieces: Vec<String> = chunks
        .into_iter()
        .flat_map(|c| {
            if c.text.len() > max_chars {
                hard_split(&c.text, max_chars)
            } else {
                vec![c.text]
            }
        })
        .collect();
    debug!(path = %doc.path, pieces = pieces.len(), max_chars, "split oversized chunk");
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk::new(&doc.path, i, text))
        .collect()
}

pub fn chunk_all_capped(docs: &[SourceDocument], policy: ChunkPolicy, max_chars: usize) -> Vec<Chunk> {
    docs.iter()
        .flat_map(|doc| chunk_document_capped(doc, policy, max_chars))
        .collect()
}

fn split_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut buf = String::new();

    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let joined_len = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };
        if joined_len > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
        }

        if para.len() > max_chars {
            pieces.extend(hard_split(para, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }
    if pieces.is_empty() {
        pieces.push(text.trim().to_string());
    }
    pieces
}

/// Split an oversized paragraph, preferring the last newline or space inside
/// each window. Windows always end on a UTF-8 char boundary and always make
/// progress.
fn hard_split(mut rest: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    while !rest.is_empty() {
        let mut end = floor_char_boundary(rest, max_chars);
        if end < rest.len() {
            if let Some(pos) = rest[..end].rfind(['\n', ' ']) {
                end = pos + 1;
            }
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let piece = rest[..end].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        rest = &rest[end..];
    }
    out
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(body: &str) -> SourceDocument {
        SourceDocument::new("src/lib.rs", body)
    }

    #[test]
    fn test_whole_file_single_chunk() {
        let chunks = chunk_document(&doc("a\n\nb\n\nc"), ChunkPolicy::WholeFile);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a\n\nb\n\nc");
        assert_eq!(chunks[0].path, "src/lib.rs");
    }

    #[test]
    fn test_paragraphs_packed_under_limit() {
        let chunks = chunk_document(
            &doc("First.\n\nSecond.\n\nThird."),
            ChunkPolicy::Paragraph { max_tokens: 700 },
        );
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Third."));
    }

    #[test]
    fn test_paragraphs_split_over_limit() {
        let chunks = chunk_document(
            &doc("This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three."),
            ChunkPolicy::Paragraph { max_tokens: 5 },
        );
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.id, format!("src/lib.rs#{}", i));
        }
    }

    #[test]
    fn test_multibyte_hard_split() {
        let text = "┌──────────────────┐\n│ こんにちは world │\n└──────────────────┘";
        let chunks = chunk_document(&doc(text), ChunkPolicy::Paragraph { max_tokens: 1 });
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn test_chunk_all_keeps_document_order() {
        let docs = vec![
            SourceDocument::new("a.md", "alpha"),
            SourceDocument::new("b.md", "beta"),
        ];
        let chunks = chunk_all(&docs, ChunkPolicy::WholeFile);
        let paths: Vec<&str> = chunks.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.md"]);
    }

    #[test]
    fn test_capped_whole_file_splits_large_file() {
        let line = "fn handler() { let value = compute(); }\n";
        let body = line.repeat(1000);
        let chunks = chunk_document_capped(&doc(&body), ChunkPolicy::WholeFile, 4000);
        assert!(chunks.len() >= 10);
        for (i, c) in chunks.iter().enumerate() {
            assert!(c.text.len() <= 4000);
            assert_eq!(c.chunk_index, i);
            assert_eq!(c.path, "src/lib.rs");
        }
        let total: usize = chunks.iter().map(|c| c.text.matches("handler").count()).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn test_capped_leaves_small_file_whole() {
        let chunks = chunk_document_capped(&doc("a\n\nb"), ChunkPolicy::WholeFile, 4000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "a\n\nb");
    }

    proptest! {
        #[test]
        fn capped_chunks_respect_cap(
            body in "\\PC{1,600}",
            max_chars in 4usize..200,
        ) {
            let chunks = chunk_document_capped(&doc(&body), ChunkPolicy::WholeFile, max_chars);
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.chunk_index, i);
                prop_assert!(c.text.len() <= max_chars);
            }
        }

        #[test]
        fn paragraph_chunks_respect_budget(
            body in "\\PC{0,600}",
            max_tokens in 1usize..40,
        ) {
            let chunks = chunk_document(&doc(&body), ChunkPolicy::Paragraph { max_tokens });
            prop_assert!(!chunks.is_empty());
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.chunk_index, i);
                prop_assert_eq!(&c.path, "src/lib.rs");
                prop_assert!(c.text.len() <= max_tokens * CHARS_PER_TOKEN);
            }
        }
    }
}
