//! File selection predicate.
//!
//! [`FileSelector`] decides which snapshot files are indexed. It is a plain
//! value (an extension allow-list and a path-fragment allow-list) evaluated by
//! [`FileSelector::select`], with no I/O and no captured state.
//!
//! A path is selected iff it passes both tests:
//!
//! | Test | Passes when |
//! |------|-------------|
//! | extension | list is empty, or the path ends with one of the suffixes |
//! | fragment | list is empty, or the path contains one of the fragments |
//!
//! # Example
//!
//! ```rust
//! use repo_chat_core::select::FileSelector;
//!
//! let selector = FileSelector::new(["md"], ["docs/"]);
//! assert!(selector.select("docs/readme.md"));
//! assert!(!selector.select("docs/notes.txt"));
//! assert!(!selector.select("src/main.md"));
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelector {
    /// Suffixes, each with a leading dot.
    pub extensions: Vec<String>,
    /// Substrings, at least one of which must appear in the path.
    pub fragments: Vec<String>,
}

impl FileSelector {
    /// Build a selector, normalizing extensions to a leading-dot form and
    /// dropping empty tokens.
    pub fn new<E, F>(extensions: E, fragments: F) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .filter_map(|e| normalize_extension(e.as_ref()))
                .collect(),
            fragments: fragments
                .into_iter()
                .map(|f| f.as_ref().trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    /// A selector that accepts every path.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn select(&self, path: &str) -> bool {
        self.matches_extension(path) && self.matches_fragment(path)
    }

    fn matches_extension(&self, path: &str) -> bool {
        self.extensions.is_empty() || self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }

    fn matches_fragment(&self, path: &str) -> bool {
        self.fragments.is_empty() || self.fragments.iter().any(|frag| path.contains(frag.as_str()))
    }
}

/// Split a comma- and/or whitespace-separated list into normalized extensions.
///
/// ```rust
/// use repo_chat_core::select::parse_extension_list;
///
/// assert_eq!(parse_extension_list("rs, .md  txt"), vec![".rs", ".md", ".txt"]);
/// ```
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    split_tokens(raw).filter_map(normalize_extension).collect()
}

/// Split a comma-separated fragment list, dropping empty entries.
pub fn parse_fragment_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
}

fn normalize_extension(token: &str) -> Option<String> {
    let token = token.trim();
    if token.is_empty() || token == "." {
        return None;
    }
    if token.starts_with('.') {
        Some(token.to_string())
    } else {
        Some(format!(".{}", token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_docs_markdown_scenario() {
        let selector = FileSelector::new([".md"], ["docs/"]);
        let paths = ["docs/readme.md", "docs/notes.txt", "src/main.md"];
        let selected: Vec<&str> = paths.into_iter().filter(|p| selector.select(p)).collect();
        assert_eq!(selected, vec!["docs/readme.md"]);
    }

    #[test]
    fn test_empty_lists_match_everything() {
        let selector = FileSelector::all();
        assert!(selector.select("anything/at/all.bin"));
        assert!(selector.select(""));
    }

    #[test]
    fn test_only_extensions_configured() {
        let selector = FileSelector::new(["rs", "toml"], Vec::<String>::new());
        assert!(selector.select("src/lib.rs"));
        assert!(selector.select("Cargo.toml"));
        assert!(!selector.select("README.md"));
    }

    #[test]
    fn test_only_fragments_configured() {
        let selector = FileSelector::new(Vec::<String>::new(), ["src/", "tests/"]);
        assert!(selector.select("crates/a/src/lib.rs"));
        assert!(selector.select("tests/it.rs"));
        assert!(!selector.select("docs/guide.md"));
    }

    #[test]
    fn test_extension_normalization() {
        let selector = FileSelector::new([" md ", ".rs", "", "."], [" ", "src/"]);
        assert_eq!(selector.extensions, vec![".md", ".rs"]);
        assert_eq!(selector.fragments, vec!["src/"]);
    }

    #[test]
    fn test_parse_extension_list_separators() {
        assert_eq!(parse_extension_list("py,js"), vec![".py", ".js"]);
        assert_eq!(parse_extension_list(" .py  js ,, ts"), vec![".py", ".js", ".ts"]);
        assert!(parse_extension_list("").is_empty());
    }

    #[test]
    fn test_parse_fragment_list() {
        assert_eq!(parse_fragment_list("src/, docs/ ,"), vec!["src/", "docs/"]);
        assert!(parse_fragment_list("").is_empty());
    }

    proptest! {
        #[test]
        fn select_is_conjunction_of_both_tests(
            path in "[a-z/]{0,12}(\\.[a-z]{1,3})?",
            exts in proptest::collection::vec("[a-z]{1,3}", 0..3),
            frags in proptest::collection::vec("[a-z/]{1,4}", 0..3),
        ) {
            let selector = FileSelector::new(&exts, &frags);
            let ext_ok = exts.is_empty() || exts.iter().any(|e| path.ends_with(&format!(".{}", e)));
            let frag_ok = frags.is_empty() || frags.iter().any(|f| path.contains(f.as_str()));
            prop_assert_eq!(selector.select(&path), ext_ok && frag_ok);
        }

        #[test]
        fn select_is_deterministic(
            path in "\\PC{0,24}",
            exts in proptest::collection::vec("\\PC{0,4}", 0..3),
            frags in proptest::collection::vec("\\PC{0,4}", 0..3),
        ) {
            let selector = FileSelector::new(&exts, &frags);
            let first = selector.select(&path);
            prop_assert_eq!(selector.clone().select(&path), first);
            prop_assert_eq!(selector.select(&path), first);
        }
    }
}
