//! Disposable per-candidate build workspaces.
//!
//! A [`ScopedWorkspace`] is released when dropped, whichever way the build
//! ended, unless retention was requested.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::CommandFailure;
use crate::process::{render, run_captured, run_checked};

const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Hands out an isolated directory holding the sources of one candidate
pub trait WorkspaceProvider: Send + Sync {
    fn acquire(&self, id: &str) -> Result<ScopedWorkspace, CommandFailure>;
}

#[derive(Debug)]
enum Release {
    /// Leave the directory in place
    Retain,
    /// `git worktree remove --force`, then delete whatever is left
    GitWorktree { repo: PathBuf },
    /// Delete the directory tree
    RemoveDir,
}

/// A workspace that cleans up after itself
#[derive(Debug)]
pub struct ScopedWorkspace {
    path: PathBuf,
    release: Release,
}

impl ScopedWorkspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_retained(&self) -> bool {
        matches!(self.release, Release::Retain)
    }
}

impl Drop for ScopedWorkspace {
    fn drop(&mut self) {
        match &self.release {
            Release::Retain => {
                tracing::debug!(path = %self.path.display(), "retaining workspace");
            }
            Release::GitWorktree { repo } => {
                let mut cmd = Command::new("git");
                cmd.current_dir(repo)
                    .args(["worktree", "remove", "--force"])
                    .arg(&self.path);
                if let Err(e) = run_checked(&mut cmd, Some(GIT_TIMEOUT)) {
                    tracing::warn!(path = %self.path.display(), error = %e, "worktree removal failed");
                }
                remove_dir_quietly(&self.path);
            }
            Release::RemoveDir => remove_dir_quietly(&self.path),
        }
    }
}

fn remove_dir_quietly(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_dir_all(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove workspace");
        }
    }
}

fn prefix(id: &str, len: usize) -> &str {
    match id.char_indices().nth(len) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Detached git worktrees under `<root>/<id[..12]>`
#[derive(Debug, Clone)]
pub struct GitWorktrees {
    repo: PathBuf,
    root: PathBuf,
    retain: bool,
}

impl GitWorktrees {
    pub fn new(repo: impl Into<PathBuf>, root: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            repo: repo.into(),
            root: root.into(),
            retain,
        }
    }
}

impl WorkspaceProvider for GitWorktrees {
    fn acquire(&self, id: &str) -> Result<ScopedWorkspace, CommandFailure> {
        fs::create_dir_all(&self.root).map_err(|e| {
            CommandFailure::new(
                format!("mkdir {}", self.root.display()),
                format!("cannot create worktree root: {e}"),
            )
        })?;
        let path = self.root.join(prefix(id, 12));

        // A stale worktree from an interrupted run would make `add` fail.
        if path.exists() {
            remove_dir_quietly(&path);
        }
        let mut prune = Command::new("git");
        prune.current_dir(&self.repo).args(["worktree", "prune"]);
        let _ = run_captured(&mut prune, Some(GIT_TIMEOUT));

        let mut add = Command::new("git");
        add.current_dir(&self.repo)
            .args(["worktree", "add", "--detach"])
            .arg(&path)
            .arg(id);
        tracing::debug!(command = %render(&add), "creating worktree");
        run_checked(&mut add, Some(GIT_TIMEOUT))?;

        let release = if self.retain {
            Release::Retain
        } else {
            Release::GitWorktree {
                repo: self.repo.clone(),
            }
        };
        Ok(ScopedWorkspace { path, release })
    }
}

/// Empty scratch directories under `<root>/<id[..12]>`, for toolchains that
/// fetch their own sources
#[derive(Debug, Clone)]
pub struct ScratchWorkspaces {
    root: PathBuf,
    retain: bool,
}

impl ScratchWorkspaces {
    pub fn new(root: impl Into<PathBuf>, retain: bool) -> Self {
        Self {
            root: root.into(),
            retain,
        }
    }
}

impl WorkspaceProvider for ScratchWorkspaces {
    fn acquire(&self, id: &str) -> Result<ScopedWorkspace, CommandFailure> {
        let path = self.root.join(prefix(id, 12));
        remove_dir_quietly(&path);
        fs::create_dir_all(&path).map_err(|e| {
            CommandFailure::new(
                format!("mkdir {}", path.display()),
                format!("cannot create workspace: {e}"),
            )
        })?;
        let release = if self.retain {
            Release::Retain
        } else {
            Release::RemoveDir
        };
        Ok(ScopedWorkspace { path, release })
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod workspace_tests;
