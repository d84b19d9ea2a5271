//! Load selected files from a snapshot as [`SourceDocument`]s.
//!
//! The walk skips `.git`, ignores symlinks, and matches every regular file
//! against the [`FileSelector`] using its snapshot-relative path with `/`
//! separators. Output is sorted by path. Empty and whitespace-only files are
//! dropped; files that are not valid UTF-8 are handled according to
//! [`UndecodablePolicy`].

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use repo_chat_core::models::SourceDocument;
use repo_chat_core::select::FileSelector;

use crate::config::UndecodablePolicy;

pub fn load_documents(
    root: &Path,
    selector: &FileSelector,
    on_undecodable: UndecodablePolicy,
) -> Result<Vec<SourceDocument>> {
    if !root.is_dir() {
        bail!("snapshot directory does not exist: {}", root.display());
    }

    let mut documents = Vec::new();
    let mut skipped = 0usize;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_git_dir(e));

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = relative_path(root, entry.path());
        if !selector.select(&rel_path) {
            continue;
        }

        let bytes = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        let body = match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(_) => {
                match on_undecodable {
                    UndecodablePolicy::Error => bail!("{} is not valid UTF-8", rel_path),
                    UndecodablePolicy::Warn => warn!(path = %rel_path, "skipping non UTF-8 file"),
                    UndecodablePolicy::Skip => debug!(path = %rel_path, "skipping non UTF-8 file"),
                }
                skipped += 1;
                continue;
            }
        };

        if body.trim().is_empty() {
            debug!(path = %rel_path, "skipping empty file");
            skipped += 1;
            continue;
        }

        documents.push(SourceDocument::new(rel_path, body));
    }

    documents.sort_by(|a, b| a.path.cmp(&b.path));
    info!(documents = documents.len(), skipped, "loaded source documents");
    Ok(documents)
}

fn is_git_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == ".git"
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
