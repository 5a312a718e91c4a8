//! Error taxonomy for the ranking pipeline.
//!
//! Only [`PipelineError`] aborts a run. [`BuildFailure`] and
//! [`MatchToolError`] are local to one candidate or one pair; the pipeline
//! records them and carries on.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use sprt_core::{SprtConfigError, TimeControlError};

/// How many trailing output lines are kept when reporting a failed command
pub const OUTPUT_TAIL_LINES: usize = 40;

/// Last `lines` lines of a captured output
pub fn tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// An external command that did not do its job, with everything needed to
/// diagnose it without rerunning.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{reason}: `{command}`")]
pub struct CommandFailure {
    pub command: String,
    pub reason: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    pub fn new(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            reason: reason.into(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Build-log layout: command, then stdout and stderr sections
    pub fn to_log(&self) -> String {
        format!(
            "CMD: {}\nREASON: {}\n---- STDOUT ----\n{}\n---- STDERR ----\n{}",
            self.command, self.reason, self.stdout, self.stderr
        )
    }
}

/// Revision expression could not be turned into candidates. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("revision expression {expr:?} matched no commits")]
    NoCandidates { expr: String },

    #[error("git failed while resolving {expr:?}: {failure}")]
    Git {
        expr: String,
        #[source]
        failure: CommandFailure,
    },
}

/// One candidate could not be built. Recorded, never fatal.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("build of {id} failed: {failure}")]
pub struct BuildFailure {
    pub id: String,
    #[source]
    pub failure: CommandFailure,
    /// Where the full build log was written, if it could be written
    pub log_path: Option<PathBuf>,
}

/// The match tool (or an engine it drives) misbehaved for one pair.
/// Recorded; the pair counts as inconclusive with zero games.
#[derive(Debug, thiserror::Error)]
pub enum MatchToolError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {after:?}\n{tail}")]
    Timeout {
        command: String,
        after: Duration,
        tail: String,
    },

    #[error("`{command}` exited abnormally ({exit_code:?}) without finishing the match\n{tail}")]
    Crashed {
        command: String,
        exit_code: Option<i32>,
        tail: String,
    },

    #[error("could not parse match output: {reason}\n{tail}")]
    Unparseable { reason: String, tail: String },

    #[error("engine {engine} failed: {reason}")]
    Engine { engine: String, reason: String },
}

/// Startup configuration problems. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid SPRT parameters: {0}")]
    Sprt(#[from] SprtConfigError),

    #[error("invalid time control: {0}")]
    TimeControl(#[from] TimeControlError),

    #[error("could not find the match tool; set --fastchess or the FASTCHESS environment variable")]
    MatchToolNotFound,

    #[error("no valid opening FEN/EPD entries found in {paths:?}")]
    NoOpenings { paths: Vec<PathBuf> },

    #[error("{0}")]
    Invalid(String),
}

/// Run-level failures
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("need at least {required} buildable versions, only {built} of {total} built")]
    InsufficientVersions {
        built: usize,
        total: usize,
        required: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run cancelled before matching started")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Report persistence failures
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
