//! Turning a revision expression into the ordered list of candidates.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::ResolutionError;
use crate::process::run_checked;

/// git invocations are local and quick; anything slower is hung
const GIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Which revisions to rank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    /// Revision expression, e.g. `main` or `v1.0..main`
    pub expr: String,
    /// Follow only first parents of merges
    pub first_parent: bool,
    /// Keep only the last N candidates (0 = all)
    pub max_candidates: usize,
}

/// Source of candidate identifiers.
///
/// Implementations must be deterministic: resolving the same request twice
/// yields the same sequence, since every later stage keys its state by
/// identifier.
pub trait VersionSource: Send + Sync {
    /// Oldest-first, unique identifiers
    fn resolve(&self, request: &ResolveRequest) -> Result<Vec<String>, ResolutionError>;

    /// Human-readable label for an identifier
    fn label(&self, id: &str) -> String;
}

/// Abbreviated identifier used for file names and tables
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Drops repeats (keeping the first), then keeps the last `max` entries
pub fn finalize_candidates(ids: Vec<String>, max: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut unique: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
    if max > 0 && unique.len() > max {
        unique.drain(..unique.len() - max);
    }
    unique
}

/// Resolves candidates from a git repository's history
#[derive(Debug, Clone)]
pub struct GitResolver {
    repo: PathBuf,
}

impl GitResolver {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo);
        cmd
    }
}

impl VersionSource for GitResolver {
    fn resolve(&self, request: &ResolveRequest) -> Result<Vec<String>, ResolutionError> {
        let mut cmd = self.git();
        cmd.args(["rev-list", "--reverse"]);
        if request.first_parent {
            cmd.arg("--first-parent");
        }
        cmd.arg(&request.expr);

        let output = run_checked(&mut cmd, Some(GIT_TIMEOUT)).map_err(|failure| {
            ResolutionError::Git {
                expr: request.expr.clone(),
                failure,
            }
        })?;

        let ids: Vec<String> = output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let ids = finalize_candidates(ids, request.max_candidates);

        if ids.is_empty() {
            return Err(ResolutionError::NoCandidates {
                expr: request.expr.clone(),
            });
        }
        tracing::info!(expr = %request.expr, count = ids.len(), "resolved candidates");
        Ok(ids)
    }

    fn label(&self, id: &str) -> String {
        let mut cmd = self.git();
        cmd.args(["show", "-s", "--format=%h %s", id]);
        match run_checked(&mut cmd, Some(GIT_TIMEOUT)) {
            Ok(output) if !output.stdout.trim().is_empty() => output.stdout.trim().to_string(),
            _ => short_id(id).to_string(),
        }
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
