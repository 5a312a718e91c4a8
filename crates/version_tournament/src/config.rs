//! Run configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) is a
//! valid configuration. CLI flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use sprt_core::{SprtConfig, TimeControl};

use crate::error::ConfigError;

/// Root configuration schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub resolve: ResolveSettings,
    pub build: BuildSettings,
    #[serde(rename = "match")]
    pub matches: MatchSettings,
    pub sprt: SprtConfig,
    pub output: OutputSettings,
}

/// Which revisions to rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveSettings {
    pub repo: PathBuf,
    pub revisions: String,
    pub first_parent: bool,
    /// Keep only the last N candidates (0 = all)
    pub max_candidates: usize,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            repo: PathBuf::from("."),
            revisions: "main".to_string(),
            first_parent: true,
            max_candidates: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolchainKind {
    Cmake,
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    pub toolchain: ToolchainKind,
    /// Executable name the toolchain produces, without suffix
    pub binary_stem: String,
    /// Parallel jobs passed to the build tool
    pub jobs: u32,
    /// Candidates built at the same time
    pub parallel_builds: usize,
    pub timeout_secs: Option<u64>,
    pub retain_workspaces: bool,
    /// Argv lists run in the workspace (`command` toolchain)
    pub steps: Vec<Vec<String>>,
    /// Produced binary, relative to the workspace (`command` toolchain)
    pub artifact: Option<PathBuf>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            toolchain: ToolchainKind::Cmake,
            binary_stem: "engine".to_string(),
            jobs: 8,
            parallel_builds: 1,
            timeout_secs: Some(1800),
            retain_workspaces: false,
            steps: Vec::new(),
            artifact: None,
        }
    }
}

impl BuildSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// How pairs are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// One fastchess session per pair
    Fastchess,
    /// Games driven one by one over UCI
    Games,
}

impl MatchStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStrategy::Fastchess => "fastchess",
            MatchStrategy::Games => "games",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchSettings {
    pub strategy: MatchStrategy,
    pub fastchess: Option<PathBuf>,
    pub time_control: TimeControl,
    /// Fixed time per move; overrides `time_control` when above 0
    pub movetime_ms: Option<u64>,
    pub hash_mb: u32,
    pub threads: u32,
    pub games_per_match: u32,
    pub concurrency: u32,
    /// FEN/EPD files; `<repo>/bench/fens.txt` when empty
    pub openings: Vec<PathBuf>,
    pub save_pgn: bool,
    pub seed: u64,
    /// Overrides the session timeout derived from the time control
    pub timeout_secs: Option<u64>,
    /// Pairs played at the same time
    pub parallel_pairs: usize,
    /// Ply cap for the `games` strategy
    pub max_plies: u32,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            strategy: MatchStrategy::Fastchess,
            fastchess: None,
            time_control: TimeControl::default(),
            movetime_ms: None,
            hash_mb: 32,
            threads: 1,
            games_per_match: 1000,
            concurrency: 1,
            openings: Vec::new(),
            save_pgn: false,
            seed: 42,
            timeout_secs: None,
            parallel_pairs: 1,
            max_plies: crate::game_runner::DEFAULT_MAX_PLIES,
        }
    }
}

impl MatchSettings {
    /// The time control actually used, after the move-time override
    pub fn effective_time_control(&self) -> TimeControl {
        match self.movetime_ms {
            Some(ms) if ms > 0 => TimeControl::move_time_ms(ms),
            _ => self.time_control,
        }
    }

    /// Opening files to read, falling back to the repository's bench set
    pub fn opening_paths(&self, repo: &Path) -> Vec<PathBuf> {
        if self.openings.is_empty() {
            vec![repo.join("bench").join("fens.txt")]
        } else {
            self.openings.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sprt"),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects settings no run could succeed with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sprt.validate()?;
        if !self.sprt.is_well_ordered() {
            tracing::warn!(
                elo0 = self.sprt.elo0,
                elo1 = self.sprt.elo1,
                "elo1 is not above elo0; H1 and H0 swap meaning"
            );
        }
        if self.matches.games_per_match == 0 {
            return Err(ConfigError::Invalid(
                "games_per_match must be greater than 0".to_string(),
            ));
        }
        if self.build.toolchain == ToolchainKind::Command
            && (self.build.steps.is_empty() || self.build.artifact.is_none())
        {
            return Err(ConfigError::Invalid(
                "the command toolchain needs build.steps and build.artifact".to_string(),
            ));
        }
        if self.resolve.revisions.trim().is_empty() {
            return Err(ConfigError::Invalid("revision expression is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
