//! Build cache and orchestration.
//!
//! Artifacts live at `<out>/bin/<stem>_<id[..8]>` and are keyed purely by
//! identifier: an existing file is trusted and returned as-is. Failures are
//! logged to `<out>/logs/build_<id[..8]>.log` and returned to the caller,
//! who skips the candidate.

use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{BuildFailure, CommandFailure};
use crate::pipeline::CancelFlag;
use crate::resolver::short_id;
use crate::process::run_checked;
use crate::workspace::{ScopedWorkspace, WorkspaceProvider};

/// Produces a runnable binary from a checked-out workspace
pub trait Toolchain: Send + Sync {
    /// Builds inside `workspace` and returns the produced binary's path
    fn build(&self, workspace: &Path) -> Result<PathBuf, CommandFailure>;
}

/// Platform executable suffix
pub fn exe_suffix() -> &'static str {
    std::env::consts::EXE_SUFFIX
}

/// CMake configure + build, then look for `<stem>` in the usual places
#[derive(Debug, Clone)]
pub struct CmakeToolchain {
    pub binary_stem: String,
    pub jobs: u32,
    pub build_dir: String,
    pub timeout: Option<Duration>,
}

impl CmakeToolchain {
    pub fn new(binary_stem: impl Into<String>, jobs: u32, timeout: Option<Duration>) -> Self {
        Self {
            binary_stem: binary_stem.into(),
            jobs: jobs.max(1),
            build_dir: "build-rel".to_string(),
            timeout,
        }
    }

    fn artifact_candidates(&self, build_dir: &Path) -> Vec<PathBuf> {
        let exe = format!("{}.exe", self.binary_stem);
        vec![
            build_dir.join("Release").join(&exe),
            build_dir.join(&exe),
            build_dir.join(&self.binary_stem),
        ]
    }
}

impl Toolchain for CmakeToolchain {
    fn build(&self, workspace: &Path) -> Result<PathBuf, CommandFailure> {
        let build_dir = workspace.join(&self.build_dir);

        let mut configure = Command::new("cmake");
        configure
            .arg("-S")
            .arg(workspace)
            .arg("-B")
            .arg(&build_dir)
            .arg("-DCMAKE_BUILD_TYPE=Release");
        run_checked(&mut configure, self.timeout)?;

        let mut build = Command::new("cmake");
        build
            .arg("--build")
            .arg(&build_dir)
            .args(["--config", "Release", "-j"])
            .arg(self.jobs.to_string());
        let output = run_checked(&mut build, self.timeout)?;

        self.artifact_candidates(&build_dir)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| output.into_failure(format!("artifact {} not found", self.binary_stem)))
    }
}

/// Arbitrary build steps run in the workspace, artifact at a fixed
/// relative path
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    pub steps: Vec<Vec<String>>,
    pub artifact: PathBuf,
    pub timeout: Option<Duration>,
}

impl Toolchain for CommandToolchain {
    fn build(&self, workspace: &Path) -> Result<PathBuf, CommandFailure> {
        for step in &self.steps {
            let Some((program, args)) = step.split_first() else {
                continue;
            };
            let mut cmd = Command::new(program);
            cmd.args(args).current_dir(workspace);
            run_checked(&mut cmd, self.timeout)?;
        }
        let artifact = workspace.join(&self.artifact);
        if artifact.is_file() {
            Ok(artifact)
        } else {
            Err(CommandFailure::new(
                self.steps
                    .last()
                    .map(|s| s.join(" "))
                    .unwrap_or_default(),
                format!("artifact {} not found", self.artifact.display()),
            ))
        }
    }
}

/// Unique per process and per call, so builders racing on one id never
/// share a staging file
fn staging_path(target: &Path) -> PathBuf {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".partial{}-{n}", std::process::id()));
    target.with_file_name(name)
}

/// Identifier-keyed artifact cache in front of a workspace provider and a
/// toolchain
pub struct BuildCache {
    out_dir: PathBuf,
    binary_stem: String,
    workspaces: Box<dyn WorkspaceProvider>,
    toolchain: Box<dyn Toolchain>,
    memo: Mutex<HashMap<String, Result<PathBuf, BuildFailure>>>,
    toolchain_runs: AtomicUsize,
}

impl BuildCache {
    pub fn new(
        out_dir: impl Into<PathBuf>,
        binary_stem: impl Into<String>,
        workspaces: Box<dyn WorkspaceProvider>,
        toolchain: Box<dyn Toolchain>,
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            binary_stem: binary_stem.into(),
            workspaces,
            toolchain,
            memo: Mutex::new(HashMap::new()),
            toolchain_runs: AtomicUsize::new(0),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.out_dir.join("bin")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.out_dir.join("logs")
    }

    /// Deterministic cache location for `id`
    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.bin_dir()
            .join(format!("{}_{}{}", self.binary_stem, short_id(id), exe_suffix()))
    }

    /// How many times the toolchain was actually invoked
    pub fn toolchain_runs(&self) -> usize {
        self.toolchain_runs.load(Ordering::SeqCst)
    }

    fn remembered(&self, id: &str) -> Option<Result<PathBuf, BuildFailure>> {
        self.memo.lock().ok()?.get(id).cloned()
    }

    fn remember(&self, id: &str, result: &Result<PathBuf, BuildFailure>) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(id.to_string(), result.clone());
        }
    }

    /// Returns the artifact for `id`, building it on a cache miss.
    ///
    /// Safe to call repeatedly: a cached artifact or a recorded failure is
    /// returned without touching the toolchain again.
    pub fn ensure_built(&self, id: &str) -> Result<PathBuf, BuildFailure> {
        if let Some(result) = self.remembered(id) {
            return result;
        }

        let target = self.artifact_path(id);
        if target.is_file() {
            tracing::debug!(id = short_id(id), path = %target.display(), "build cache hit");
            let result = Ok(target);
            self.remember(id, &result);
            return result;
        }

        let result = self.build_uncached(id, &target).map_err(|failure| {
            let log_path = self.write_log(id, &failure);
            BuildFailure {
                id: id.to_string(),
                failure,
                log_path,
            }
        });
        match &result {
            Ok(path) => tracing::info!(id = short_id(id), path = %path.display(), "built"),
            Err(e) => tracing::warn!(
                id = short_id(id),
                command = %e.failure.command,
                reason = %e.failure.reason,
                log = ?e.log_path,
                "build failed, skipping candidate"
            ),
        }
        self.remember(id, &result);
        result
    }

    fn build_uncached(&self, id: &str, target: &Path) -> Result<PathBuf, CommandFailure> {
        fs::create_dir_all(self.bin_dir()).map_err(|e| {
            CommandFailure::new(
                format!("mkdir {}", self.bin_dir().display()),
                e.to_string(),
            )
        })?;

        let workspace: ScopedWorkspace = self.workspaces.acquire(id)?;
        self.toolchain_runs.fetch_add(1, Ordering::SeqCst);
        let produced = self.toolchain.build(workspace.path())?;

        // Copy under a private name and rename, so concurrent builders of
        // the same id never expose a half-written binary.
        let staging = staging_path(target);
        let copy = fs::copy(&produced, &staging).and_then(|_| fs::rename(&staging, target));
        if let Err(e) = copy {
            let _ = fs::remove_file(&staging);
            return Err(CommandFailure::new(
                format!("copy {} {}", produced.display(), target.display()),
                e.to_string(),
            ));
        }
        Ok(target.to_path_buf())
    }

    fn write_log(&self, id: &str, failure: &CommandFailure) -> Option<PathBuf> {
        let dir = self.logs_dir();
        let path = dir.join(format!("build_{}.log", short_id(id)));
        let written = fs::create_dir_all(&dir).and_then(|_| fs::write(&path, failure.to_log()));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not write build log");
                None
            }
        }
    }

    /// Builds every id on up to `threads` workers; results keep input order.
    ///
    /// Returns `None` if cancellation was requested before all builds ran.
    pub fn build_all(
        &self,
        ids: &[String],
        threads: usize,
        cancel: &CancelFlag,
    ) -> Option<Vec<Result<PathBuf, BuildFailure>>> {
        let build_one = |id: &String| {
            if cancel.is_cancelled() {
                None
            } else {
                Some(self.ensure_built(id))
            }
        };

        let results: Vec<Option<Result<PathBuf, BuildFailure>>> = if threads <= 1 {
            ids.iter().map(build_one).collect()
        } else {
            match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => pool.install(|| ids.par_iter().map(build_one).collect()),
                Err(e) => {
                    tracing::warn!(error = %e, "could not start build pool, building sequentially");
                    ids.iter().map(build_one).collect()
                }
            }
        };
        results.into_iter().collect()
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod builder_tests;
