//! Match runner for playing one pair of versions against each other

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use sprt_core::{SprtConfig, SprtResult, TimeControl};

use crate::error::{tail, MatchToolError, OUTPUT_TAIL_LINES};
use crate::fastchess::{parse_summary, FINISHED_MARKER};
use crate::pipeline::Version;
use crate::process::{run_captured, RunError};

/// Configuration shared by every pairwise match of a run
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Thinking time given to both engines
    pub time_control: TimeControl,
    /// EPD file with one opening per line
    pub openings: PathBuf,
    /// Transposition table size per engine
    pub hash_mb: u32,
    /// Search threads per engine (only passed on when above 1)
    pub threads: u32,
    /// Games per pair, played as ceil(games/2) color-reversed rounds
    pub games_per_match: u32,
    /// Games the tool plays at once
    pub concurrency: u32,
    /// Save each pair's games to `<dir>/<a>_vs_<b>.pgn`
    pub pgn_dir: Option<PathBuf>,
    /// Overrides the timeout derived from the time control
    pub timeout: Option<Duration>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            time_control: TimeControl::default(),
            openings: PathBuf::from("openings.epd"),
            hash_mb: 32,
            threads: 1,
            games_per_match: 1000,
            concurrency: 1,
            pgn_dir: None,
            timeout: None,
        }
    }
}

impl MatchConfig {
    /// Color-reversed rounds needed to cover `games_per_match`
    pub fn rounds(&self) -> u32 {
        self.games_per_match.max(1).div_ceil(2)
    }

    /// How long one session may run before the tool is considered hung
    pub fn session_timeout(&self) -> Duration {
        self.timeout.unwrap_or_else(|| {
            self.time_control
                .session_timeout(self.rounds() * 2, self.concurrency)
        })
    }
}

/// What the match tool printed for one pair
#[derive(Debug, Clone)]
pub struct RawMatchOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    /// stdout followed by stderr
    pub output: String,
    pub elapsed: Duration,
}

/// Runs one whole pairwise match through an external tool
pub trait MatchAdapter: Send + Sync {
    fn run_match(
        &self,
        challenger: &Version,
        opponent: &Version,
        config: &MatchConfig,
        sprt: &SprtConfig,
        seed: u64,
    ) -> Result<RawMatchOutput, MatchToolError>;
}

/// Drives a fastchess session per pair
#[derive(Debug, Clone)]
pub struct FastchessRunner {
    tool: PathBuf,
}

impl FastchessRunner {
    pub fn new(tool: impl Into<PathBuf>) -> Self {
        Self { tool: tool.into() }
    }

    fn engine_args(version: &Version, config: &MatchConfig) -> Vec<String> {
        let mut args = vec![
            "-engine".to_string(),
            format!("name={}", version.short),
            format!("cmd={}", version.binary.display()),
            format!("option.Hash={}", config.hash_mb),
        ];
        if config.threads > 1 {
            args.push(format!("option.Threads={}", config.threads));
        }
        args
    }

    /// Full argument list for one session (the tool path excluded)
    pub fn arguments(
        &self,
        challenger: &Version,
        opponent: &Version,
        config: &MatchConfig,
        sprt: &SprtConfig,
        seed: u64,
    ) -> Vec<String> {
        let mut args = Self::engine_args(challenger, config);
        args.extend(Self::engine_args(opponent, config));
        args.extend([
            "-each".to_string(),
            "proto=uci".to_string(),
            config.time_control.tool_arg(),
            "-rounds".to_string(),
            config.rounds().to_string(),
            "-repeat".to_string(),
            "-openings".to_string(),
            format!("file={}", config.openings.display()),
            "format=epd".to_string(),
            "order=random".to_string(),
            "-srand".to_string(),
            seed.to_string(),
            "-sprt".to_string(),
            format!("elo0={}", sprt.elo0),
            format!("elo1={}", sprt.elo1),
            format!("alpha={}", sprt.alpha),
            format!("beta={}", sprt.beta),
        ]);
        if config.concurrency > 1 {
            args.extend(["-concurrency".to_string(), config.concurrency.to_string()]);
        }
        if let Some(dir) = &config.pgn_dir {
            match fs::create_dir_all(dir) {
                Ok(()) => {
                    let pgn = dir.join(format!("{}_vs_{}.pgn", challenger.short, opponent.short));
                    args.extend(["-pgnout".to_string(), format!("file={}", pgn.display())]);
                }
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "cannot create pgn directory, not saving games")
                }
            }
        }
        args
    }
}

impl MatchAdapter for FastchessRunner {
    fn run_match(
        &self,
        challenger: &Version,
        opponent: &Version,
        config: &MatchConfig,
        sprt: &SprtConfig,
        seed: u64,
    ) -> Result<RawMatchOutput, MatchToolError> {
        let mut cmd = Command::new(&self.tool);
        cmd.args(self.arguments(challenger, opponent, config, sprt, seed));

        let timeout = config.session_timeout();
        let captured = run_captured(&mut cmd, Some(timeout)).map_err(|e| match e {
            RunError::Spawn { command, source } => MatchToolError::Spawn { command, source },
            RunError::TimedOut {
                command,
                after,
                stdout,
                stderr,
            } => MatchToolError::Timeout {
                command,
                after,
                tail: tail(&format!("{stdout}\n{stderr}"), OUTPUT_TAIL_LINES),
            },
            RunError::Wait { command, source } => MatchToolError::Crashed {
                command,
                exit_code: None,
                tail: source.to_string(),
            },
        })?;

        let output = captured.combined();
        if !captured.success && !output.contains(FINISHED_MARKER) {
            return Err(MatchToolError::Crashed {
                command: captured.command,
                exit_code: captured.exit_code,
                tail: tail(&output, OUTPUT_TAIL_LINES),
            });
        }

        Ok(RawMatchOutput {
            command: captured.command,
            exit_code: captured.exit_code,
            output,
            elapsed: captured.elapsed,
        })
    }
}

/// Decides one pair: challenger against opponent with a fixed seed
pub trait PairEvaluator: Send + Sync {
    fn evaluate(
        &self,
        challenger: &Version,
        opponent: &Version,
        seed: u64,
    ) -> Result<SprtResult, MatchToolError>;
}

/// Delegates the whole pair to a match tool, then classifies its summary
pub struct SessionEvaluator<A = FastchessRunner> {
    adapter: A,
    config: MatchConfig,
    sprt: SprtConfig,
}

impl<A: MatchAdapter> SessionEvaluator<A> {
    pub fn new(adapter: A, config: MatchConfig, sprt: SprtConfig) -> Self {
        Self {
            adapter,
            config,
            sprt,
        }
    }
}

impl<A: MatchAdapter> PairEvaluator for SessionEvaluator<A> {
    fn evaluate(
        &self,
        challenger: &Version,
        opponent: &Version,
        seed: u64,
    ) -> Result<SprtResult, MatchToolError> {
        let raw = self
            .adapter
            .run_match(challenger, opponent, &self.config, &self.sprt, seed)?;
        tracing::debug!(
            command = %raw.command,
            exit_code = ?raw.exit_code,
            elapsed = ?raw.elapsed,
            "match session finished"
        );
        let summary = parse_summary(&raw.output)?;
        Ok(summary.classify(&self.sprt))
    }
}

#[cfg(test)]
#[path = "match_runner_tests.rs"]
mod match_runner_tests;
