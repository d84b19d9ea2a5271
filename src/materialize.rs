//! Repository materialization.
//!
//! Produces a fresh working copy of one branch of a remote repository:
//!
//! 1. Remove the working directory left by any previous run. Only an empty
//!    directory or one carrying the [`WORKDIR_MARKER`] written by an earlier
//!    clone is removed; anything else is refused. Read-only entries are made
//!    writable and the removal is retried once.
//! 2. `git clone --depth 1 --branch <branch> --single-branch <url> <workdir>`
//!    under a timeout. A timed-out clone is killed, the partial directory is
//!    cleared and the clone is attempted once more. A clone that exits with
//!    an error is never retried.
//! 3. Mark the checkout as ours and record the checked-out `HEAD` commit.
//!
//! The working directory is owned by this module; nothing else writes to it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use repo_chat_core::error::PipelineError;

use crate::config::RepositoryConfig;

/// File written under `<workdir>/.git/` after a successful clone. Its
/// presence is what allows a later run to delete the directory.
pub const WORKDIR_MARKER: &str = "repo-chat-workdir";

/// A local working copy of a single branch.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    pub clone_url: String,
    pub branch: String,
    pub path: PathBuf,
    /// `None` when `git rev-parse HEAD` could not be read.
    pub head_sha: Option<String>,
    pub materialized_at: DateTime<Utc>,
}

enum CloneOutcome {
    Done,
    TimedOut,
}

/// Clone `repo.branch` of `repo.clone_url` into `repo.workdir`, replacing
/// whatever was there.
pub async fn materialize(repo: &RepositoryConfig) -> Result<RepositorySnapshot, PipelineError> {
    if repo.clone_url.trim().is_empty() || repo.branch.trim().is_empty() {
        return Err(PipelineError::Configuration(
            "repository.clone_url and repository.branch are required".into(),
        ));
    }
    materialize_inner(repo)
        .await
        .map_err(PipelineError::Materialization)
}

async fn materialize_inner(repo: &RepositoryConfig) -> Result<RepositorySnapshot> {
    let dest = &repo.workdir;
    let timeout = Duration::from_secs(repo.checkout_timeout_secs);

    clear_workdir(dest)?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    info!(url = %repo.clone_url, branch = %repo.branch, dest = %dest.display(), "cloning repository");

    let mut outcome = git_clone(&repo.clone_url, &repo.branch, dest, timeout).await?;
    if let CloneOutcome::TimedOut = outcome {
        warn!(
            timeout_secs = repo.checkout_timeout_secs,
            "git clone timed out; retrying once"
        );
        remove_tree(dest)?;
        outcome = git_clone(&repo.clone_url, &repo.branch, dest, timeout).await?;
    }
    if let CloneOutcome::TimedOut = outcome {
        remove_tree(dest).ok();
        bail!(
            "git clone timed out twice after {}s",
            repo.checkout_timeout_secs
        );
    }

    let marker = dest.join(".git").join(WORKDIR_MARKER);
    std::fs::write(&marker, format!("{}\n", repo.clone_url))
        .with_context(|| format!("Failed to write {}", marker.display()))?;

    let head_sha = match git_head_sha(dest).await {
        Ok(sha) => Some(sha),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "could not read HEAD commit");
            None
        }
    };
    info!(head = head_sha.as_deref().unwrap_or("unknown"), "repository materialized");

    Ok(RepositorySnapshot {
        clone_url: repo.clone_url.clone(),
        branch: repo.branch.clone(),
        path: dest.clone(),
        head_sha,
        materialized_at: Utc::now(),
    })
}

async fn git_clone(url: &str, branch: &str, dest: &Path, timeout: Duration) -> Result<CloneOutcome> {
    let mut cmd = Command::new("git");
    cmd.args(["clone", "--depth", "1", "--branch", branch, "--single-branch", "--"])
        .arg(url)
        .arg(dest)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => return Ok(CloneOutcome::TimedOut),
        Ok(output) => output.with_context(|| "Failed to execute 'git clone'. Is git installed?")?,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }
    Ok(CloneOutcome::Done)
}

async fn git_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .await
        .with_context(|| "Failed to get HEAD SHA")?;

    if !output.status.success() {
        bail!("git rev-parse HEAD failed");
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Remove a working directory left by an earlier run.
///
/// A missing path is not an error. An empty directory, or one holding
/// `.git/`[`WORKDIR_MARKER`], is removed. Anything else (a plain file, a
/// symlink, a directory this program did not create) is left alone and
/// reported as an error.
pub fn clear_workdir(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", path.display()))
        }
    };
    if !meta.is_dir() {
        bail!(
            "refusing to remove {}: not a directory; set repository.workdir to a dedicated directory",
            path.display()
        );
    }

    let marked = path.join(".git").join(WORKDIR_MARKER).is_file();
    let empty = std::fs::read_dir(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .next()
        .is_none();
    if !marked && !empty {
        bail!(
            "refusing to remove {}: it was not created by a previous checkout; \
             set repository.workdir to a dedicated directory or delete it by hand",
            path.display()
        );
    }
    remove_tree(path)
}

/// Remove the directory `path` and everything under it.
///
/// When removal is refused because of read-only entries, the tree is made
/// writable and removal is attempted once more.
fn remove_tree(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!(path = %path.display(), "removal refused; clearing read-only flags");
            make_writable(path)?;
            std::fs::remove_dir_all(path)
                .with_context(|| format!("Failed to remove {}", path.display()))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

fn make_writable(root: &Path) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if entry.path_is_symlink() {
            continue;
        }
        let mut perms = entry.metadata()?.permissions();
        set_owner_writable(&mut perms);
        std::fs::set_permissions(entry.path(), perms)
            .with_context(|| format!("Failed to make {} writable", entry.path().display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_writable(perms: &mut std::fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(perms.mode() | 0o700);
}

#[cfg(not(unix))]
#[allow(clippy::permissions_set_readonly_false)]
fn set_owner_writable(perms: &mut std::fs::Permissions) {
    perms.set_readonly(false);
}
