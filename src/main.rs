//! # repo-chat CLI
//!
//! Clones one branch of a git repository, indexes the selected files, and
//! answers questions about them with retrieval-augmented generation.
//!
//! ## Usage
//!
//! ```bash
//! repo-chat --config ./config/repo-chat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repo-chat chat` | Interactive question loop in the terminal |
//! | `repo-chat stdio` | Line protocol for a parent process (`ready!` / answer / `Processing... done!`) |
//!
//! ## Examples
//!
//! ```bash
//! # Ask about the Markdown files under docs/ on main, in English
//! repo-chat --clone-url https://github.com/org/repo.git --branch main \
//!     --filter-ext md --dir docs/ --lang en chat
//!
//! # Drive from another program
//! repo-chat --config ./config/repo-chat.toml stdio
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repo_chat::config::{resolve_config, Config, Overrides};
use repo_chat::pipeline::{Pipeline, Providers};
use repo_chat::transcript::FileTranscript;
use repo_chat::{chat, stdio};

/// Ask questions about a git repository.
///
/// Settings are read from a TOML file (`--config`, default
/// `./config/repo-chat.toml` when present); the repository flags below
/// override the file. `OPENAI_API_KEY` is read from the environment or a
/// `.env` file in the working directory.
#[derive(Parser)]
#[command(name = "repo-chat", version, about = "Retrieval-augmented Q&A over a git repository")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository to clone.
    #[arg(long, alias = "clone_url", global = true)]
    clone_url: Option<String>,

    /// Branch to check out.
    #[arg(long, global = true)]
    branch: Option<String>,

    /// File extensions to index, e.g. `md` or `.rs,.toml`. Repeatable.
    #[arg(long = "filter-ext", alias = "filter_ext", global = true, value_delimiter = ',')]
    filter_ext: Vec<String>,

    /// Path fragments; a file is indexed when its path contains any of them.
    #[arg(long = "dir", global = true, value_delimiter = ',')]
    dirs: Vec<String>,

    /// Answer language: `ja` or `en`.
    #[arg(long, global = true)]
    lang: Option<String>,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question loop.
    Chat,
    /// Line protocol on stdin/stdout for a parent process.
    Stdio,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    // RUST_LOG may come from .env.
    dotenv::dotenv().ok();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = Overrides {
        clone_url: cli.clone_url,
        branch: cli.branch,
        extensions: cli.filter_ext,
        dirs: cli.dirs,
        language: cli.lang,
    };
    let config = resolve_config(cli.config.as_deref(), overrides)?;
    let providers = Providers::openai(&config)?;
    let language = config.answer.language();

    if let Commands::Chat = cli.command {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{}\n", chat::loading_message(language)).as_bytes())
            .await?;
        stdout.flush().await?;
    }

    let started = Local::now();
    let pipeline = Pipeline::start(&config, providers).await?;
    let transcript = FileTranscript::create(&config.transcript.dir, started)?;
    info!(path = %transcript.path().display(), "writing transcript");

    let banner = banner_for(&config);
    let mut session = pipeline.into_session(transcript);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();

    match cli.command {
        Commands::Chat => chat::run(&mut session, &banner, stdin, &mut stdout).await,
        Commands::Stdio => stdio::run(&mut session, stdin, &mut stdout).await,
    }
}

fn banner_for(config: &Config) -> String {
    chat::banner(
        config.answer.language(),
        &config.repository.clone_url,
        &config.repository.branch,
        &config.filter.selector(),
    )
}
