//! TOML configuration parsing and validation.
//!
//! Every section is optional and falls back to its [`Default`]; only
//! `repository.clone_url` and `repository.branch` are required, and they may
//! also come from command-line flags (see [`Overrides`]). Validation failures
//! are reported as [`PipelineError::Configuration`].
//!
//! See `config/repo-chat.example.toml` for a complete example.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use repo_chat_core::chunk::ChunkPolicy;
use repo_chat_core::engine::{Language, DEFAULT_TOP_K, MAX_TOP_K};
use repo_chat_core::error::PipelineError;
use repo_chat_core::select::{parse_extension_list, parse_fragment_list, FileSelector};

/// Path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/repo-chat.toml";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub filter: FilterConfig,
    pub chunking: ChunkingConfig,
    pub loader: LoaderConfig,
    pub retrieval: RetrievalConfig,
    pub answer: AnswerConfig,
    pub provider: ProviderConfig,
    pub embedding: EmbeddingConfig,
    pub completion: CompletionConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RepositoryConfig {
    pub clone_url: String,
    pub branch: String,
    /// Working directory owned by the materializer; wiped on every run.
    /// Must not contain the current directory, the home directory, the
    /// transcript directory or the config file.
    pub workdir: PathBuf,
    pub checkout_timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            clone_url: String::new(),
            branch: String::new(),
            workdir: PathBuf::from("./temp"),
            checkout_timeout_secs: 300,
        }
    }
}

/// Either `"rs, md"` or `["rs", "md"]`.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ListValue {
    One(String),
    Many(Vec<String>),
}

impl Default for ListValue {
    fn default() -> Self {
        ListValue::Many(Vec::new())
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub extensions: ListValue,
    pub dirs: ListValue,
}

impl FilterConfig {
    pub fn selector(&self) -> FileSelector {
        let extensions = match &self.extensions {
            ListValue::One(raw) => parse_extension_list(raw),
            ListValue::Many(items) => items.iter().flat_map(|i| parse_extension_list(i)).collect(),
        };
        let fragments = match &self.dirs {
            ListValue::One(raw) => parse_fragment_list(raw),
            ListValue::Many(items) => items.clone(),
        };
        FileSelector::new(extensions, fragments)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    #[default]
    File,
    Paragraph,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub mode: ChunkMode,
    /// Only used by `paragraph` mode.
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: ChunkMode::File,
            max_tokens: 700,
        }
    }
}

impl ChunkingConfig {
    pub fn policy(&self) -> ChunkPolicy {
        match self.mode {
            ChunkMode::File => ChunkPolicy::WholeFile,
            ChunkMode::Paragraph => ChunkPolicy::Paragraph {
                max_tokens: self.max_tokens,
            },
        }
    }
}

/// What to do with a selected file that is not valid UTF-8.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UndecodablePolicy {
    /// Skip with a debug log.
    Skip,
    /// Skip with a warning.
    #[default]
    Warn,
    /// Abort the index build.
    Error,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoaderConfig {
    pub on_undecodable: UndecodablePolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnswerConfig {
    pub language: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            language: "ja".to_string(),
        }
    }
}

impl AnswerConfig {
    pub fn language(&self) -> Language {
        Language::from_code(&self.language)
    }
}

/// Settings shared by the embedding and completion clients.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenAI-compatible API root, without a trailing slash.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
    /// Longest single input sent to the embedding API, in bytes. Larger
    /// chunks are split.
    pub max_input_chars: usize,
    /// Total input bytes per embedding request.
    pub max_batch_chars: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-ada-002".to_string(),
            batch_size: 64,
            max_input_chars: 16_000,
            max_batch_chars: 200_000,
            max_retries: 1,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo-instruct".to_string(),
            max_tokens: 256,
            max_retries: 1,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranscriptConfig {
    pub dir: PathBuf,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./chatlog"),
        }
    }
}

/// Values supplied on the command line; each one replaces its config field.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub clone_url: Option<String>,
    pub branch: Option<String>,
    pub extensions: Vec<String>,
    pub dirs: Vec<String>,
    pub language: Option<String>,
}

impl Config {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.clone_url {
            self.repository.clone_url = url;
        }
        if let Some(branch) = overrides.branch {
            self.repository.branch = branch;
        }
        if !overrides.extensions.is_empty() {
            self.filter.extensions = ListValue::Many(overrides.extensions);
        }
        if !overrides.dirs.is_empty() {
            self.filter.dirs = ListValue::Many(overrides.dirs);
        }
        if let Some(language) = overrides.language {
            self.answer.language = language;
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Configuration(msg));

        if self.repository.clone_url.trim().is_empty() {
            return fail("repository.clone_url is not set (config file or --clone-url)".into());
        }
        if self.repository.branch.trim().is_empty() {
            return fail("repository.branch is not set (config file or --branch)".into());
        }
        if self.repository.workdir.as_os_str().is_empty() {
            return fail("repository.workdir must not be empty".into());
        }
        self.check_workdir()?;
        if self.repository.checkout_timeout_secs == 0 {
            return fail("repository.checkout_timeout_secs must be > 0".into());
        }
        if self.chunking.mode == ChunkMode::Paragraph && self.chunking.max_tokens == 0 {
            return fail("chunking.max_tokens must be > 0".into());
        }
        if !(1..=MAX_TOP_K).contains(&self.retrieval.top_k) {
            return fail(format!("retrieval.top_k must be in [1, {}]", MAX_TOP_K));
        }
        if self.embedding.model.trim().is_empty() {
            return fail("embedding.model must not be empty".into());
        }
        if self.embedding.batch_size == 0 {
            return fail("embedding.batch_size must be > 0".into());
        }
        if self.embedding.max_input_chars == 0 || self.embedding.max_batch_chars == 0 {
            return fail("embedding.max_input_chars and embedding.max_batch_chars must be > 0".into());
        }
        if self.completion.model.trim().is_empty() {
            return fail("completion.model must not be empty".into());
        }
        if self.embedding.timeout_secs == 0 || self.completion.timeout_secs == 0 {
            return fail("embedding.timeout_secs and completion.timeout_secs must be > 0".into());
        }
        if self.provider.api_key_env.trim().is_empty() {
            return fail("provider.api_key_env must not be empty".into());
        }

        let code = self.answer.language.trim().to_ascii_lowercase();
        if code != "ja" && code != "en" {
            warn!(
                language = %self.answer.language,
                fallback = %self.answer.language(),
                "unrecognized answer language"
            );
        }
        Ok(())
    }
}

impl Config {
    /// Refuse a workdir whose removal would take anything but the checkout
    /// with it.
    fn check_workdir(&self) -> Result<(), PipelineError> {
        let workdir = resolve_path(&self.repository.workdir)?;
        let fail = |why: &str| {
            Err(PipelineError::Configuration(format!(
                "repository.workdir {} {}; it is deleted on every run",
                self.repository.workdir.display(),
                why
            )))
        };

        if workdir.parent().is_none() {
            return fail("is the filesystem root");
        }
        if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
            if resolve_path(Path::new(&home))? == workdir {
                return fail("is the home directory");
            }
        }
        let cwd = std::env::current_dir()
            .map_err(|e| PipelineError::Configuration(format!("current directory: {}", e)))?;
        if resolve_path(&cwd)?.starts_with(&workdir) {
            return fail("contains the current directory");
        }
        if resolve_path(&self.transcript.dir)?.starts_with(&workdir) {
            return fail("contains transcript.dir");
        }
        Ok(())
    }

    /// Refuse a workdir that contains the config file it was read from.
    pub fn check_workdir_excludes(&self, path: &Path) -> Result<(), PipelineError> {
        if resolve_path(path)?.starts_with(resolve_path(&self.repository.workdir)?) {
            return Err(PipelineError::Configuration(format!(
                "repository.workdir {} contains the config file {}; it is deleted on every run",
                self.repository.workdir.display(),
                path.display()
            )));
        }
        Ok(())
    }
}

/// Absolute form of `path` with symlinks resolved as far as the path exists
/// and `.`/`..` resolved lexically beyond that.
fn resolve_path(path: &Path) -> Result<PathBuf, PipelineError> {
    let mut abs = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir()
            .map_err(|e| PipelineError::Configuration(format!("current directory: {}", e)))?
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                abs.pop();
            }
            other => abs.push(other.as_os_str()),
        }
    }

    let mut existing = abs.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            let mut out = real;
            out.extend(missing.iter().rev());
            return Ok(out);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(abs),
        }
    }
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path) -> Result<Config, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content)
        .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))
}

fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

/// Resolve the configuration for this run.
///
/// An explicitly given path must exist. The default path is optional: when
/// it is missing, every value comes from the built-in defaults and `overrides`.
pub fn resolve_config(explicit: Option<&Path>, overrides: Overrides) -> Result<Config, PipelineError> {
    let default_path = Path::new(DEFAULT_CONFIG_PATH);
    let source = match explicit {
        Some(path) => Some(path),
        None if default_path.exists() => Some(default_path),
        None => None,
    };
    let mut config = match source {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply(overrides);
    config.validate()?;
    if let Some(path) = source {
        config.check_workdir_excludes(path)?;
    }
    Ok(config)
}

/// Read the provider API key from the environment.
pub fn resolve_api_key(provider: &ProviderConfig) -> Result<String, PipelineError> {
    match std::env::var(&provider.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(PipelineError::Configuration(format!(
            "{} is not set",
            provider.api_key_env
        ))),
    }
}
