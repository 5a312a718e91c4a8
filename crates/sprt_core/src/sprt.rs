//! Sequential probability ratio test over a stream of game outcomes.
//!
//! The test compares two hypotheses about the challenger's true Elo
//! advantage, H0: `elo0` and H1: `elo1`, using the normal approximation of
//! the log-likelihood ratio:
//!
//! ```text
//! LLR(n) = n * ((m - p(elo0))^2 - (m - p(elo1))^2) / (2 * v)
//! ```
//!
//! where `m` and `v` are the sample mean and (floored) population variance
//! of the per-game scores, and `p` is [`expected_score`]. The test stops
//! when the LLR leaves the Wald interval `[ln(beta/(1-alpha)), ln((1-beta)/alpha)]`
//! or when the sample ceiling is hit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::elo::expected_score;
use crate::outcome::{GameResult, GameTally};

/// Lower bound for the sample variance; identical outcomes would otherwise
/// divide by zero.
pub const VARIANCE_FLOOR: f64 = 1e-6;

/// Parameters of one sequential test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprtConfig {
    /// False-positive bound (accepting H1 when H0 holds)
    pub alpha: f64,
    /// False-negative bound (accepting H0 when H1 holds)
    pub beta: f64,
    /// Elo gap under the null hypothesis
    pub elo0: f64,
    /// Elo gap under the alternative hypothesis
    pub elo1: f64,
    /// No decision is taken before this many samples
    pub min_games: u32,
    /// The test gives up as inconclusive at this many samples
    pub max_games: u32,
}

impl Default for SprtConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            beta: 0.05,
            elo0: 0.0,
            elo1: 5.0,
            min_games: 20,
            max_games: 200,
        }
    }
}

/// Rejected SPRT parameters
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SprtConfigError {
    #[error("alpha must lie strictly between 0 and 1, got {0}")]
    Alpha(f64),

    #[error("beta must lie strictly between 0 and 1, got {0}")]
    Beta(f64),

    #[error("max_games must be at least 1 and not below min_games ({min}), got {max}")]
    SampleBounds { min: u32, max: u32 },
}

impl SprtConfig {
    pub fn validate(&self) -> Result<(), SprtConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SprtConfigError::Alpha(self.alpha));
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err(SprtConfigError::Beta(self.beta));
        }
        if self.max_games == 0 || self.max_games < self.min_games {
            return Err(SprtConfigError::SampleBounds {
                min: self.min_games,
                max: self.max_games,
            });
        }
        Ok(())
    }

    /// Whether the hypotheses are ordered the usual way (`elo1 > elo0`).
    ///
    /// Not enforced; a reversed pair still runs but the decisions swap meaning.
    pub fn is_well_ordered(&self) -> bool {
        self.elo1 > self.elo0
    }

    pub fn upper_bound(&self) -> f64 {
        upper_bound(self.alpha, self.beta)
    }

    pub fn lower_bound(&self) -> f64 {
        lower_bound(self.alpha, self.beta)
    }

    /// LLR for `n` samples with the given mean and variance under this config
    pub fn llr(&self, n: u32, mean: f64, variance: f64) -> f64 {
        llr(n, mean, variance, self.elo0, self.elo1)
    }

    /// Three-way classification of a final LLR against this config's bounds
    pub fn classify(&self, llr: f64) -> Option<Decision> {
        classify_llr(llr, self.lower_bound(), self.upper_bound())
    }
}

/// Wald's upper (accept H1) bound: `ln((1 - beta) / alpha)`
pub fn upper_bound(alpha: f64, beta: f64) -> f64 {
    ((1.0 - beta) / alpha).ln()
}

/// Wald's lower (accept H0) bound: `ln(beta / (1 - alpha))`
pub fn lower_bound(alpha: f64, beta: f64) -> f64 {
    (beta / (1.0 - alpha)).ln()
}

/// Log-likelihood ratio of H1 over H0 for `n` samples.
///
/// Fewer than two samples carry no variance information and give 0.
pub fn llr(n: u32, mean: f64, variance: f64, elo0: f64, elo1: f64) -> f64 {
    if n < 2 {
        return 0.0;
    }
    let variance = variance.max(VARIANCE_FLOOR);
    let p0 = expected_score(elo0);
    let p1 = expected_score(elo1);
    n as f64 * ((mean - p0).powi(2) - (mean - p1).powi(2)) / (2.0 * variance)
}

/// `Some(H1)` at or above `upper`, `Some(H0)` at or below `lower`, else `None`.
pub fn classify_llr(llr: f64, lower: f64, upper: f64) -> Option<Decision> {
    if llr >= upper {
        Some(Decision::H1)
    } else if llr <= lower {
        Some(Decision::H0)
    } else {
        None
    }
}

/// Final verdict of a pairwise test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Challenger is materially stronger
    H1,
    /// Challenger is not materially stronger
    H0,
    /// Budget exhausted (or no data) without crossing a bound
    Inconclusive,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Decision::H1 => "H1",
            Decision::H0 => "H0",
            Decision::Inconclusive => "INCONCLUSIVE",
        };
        f.write_str(s)
    }
}

/// What the caller should do after feeding one more outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop(Decision),
}

/// Outcome of one pairwise test, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SprtResult {
    pub decision: Decision,
    /// Number of samples consumed
    pub games: u32,
    /// Cumulative challenger score
    pub score: f64,
    /// Log-likelihood ratio at the point of decision
    pub llr: f64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl SprtResult {
    /// Result recorded for a pair whose match could not be played
    pub fn no_games() -> Self {
        Self {
            decision: Decision::Inconclusive,
            games: 0,
            score: 0.0,
            llr: 0.0,
            wins: 0,
            draws: 0,
            losses: 0,
        }
    }

    /// Challenger score per game, 0.5 when nothing was played
    pub fn score_rate(&self) -> f64 {
        if self.games == 0 {
            return 0.5;
        }
        self.score / self.games as f64
    }

    /// `"W-D-L"` score line
    pub fn score_line(&self) -> String {
        format!("{}-{}-{}", self.wins, self.draws, self.losses)
    }
}

/// Running state of the test for the pair currently under evaluation.
///
/// Only the count, the running sum and the running sum of squares are kept,
/// so updating is O(1) per outcome. The `(n, llr)` trace is retained for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct SprtState {
    config: SprtConfig,
    n: u32,
    sum: f64,
    sum_sq: f64,
    tally: GameTally,
    llr: f64,
    decision: Option<Decision>,
    trace: Vec<(u32, f64)>,
}

impl SprtState {
    pub fn new(config: SprtConfig) -> Self {
        Self {
            config,
            n: 0,
            sum: 0.0,
            sum_sq: 0.0,
            tally: GameTally::new(),
            llr: 0.0,
            decision: None,
            trace: Vec::new(),
        }
    }

    pub fn config(&self) -> &SprtConfig {
        &self.config
    }

    /// Feed one game result
    pub fn push_result(&mut self, result: GameResult) -> Step {
        self.push(result.score())
    }

    /// Feed one scalar outcome in `[0, 1]`.
    ///
    /// Fractional samples other than 0.5 count toward the score but not
    /// toward the win/draw/loss tally. Once a decision has been taken the
    /// state is frozen and further samples are ignored.
    pub fn push(&mut self, outcome: f64) -> Step {
        if let Some(decision) = self.decision {
            return Step::Stop(decision);
        }

        let outcome = outcome.clamp(0.0, 1.0);
        self.n += 1;
        self.sum += outcome;
        self.sum_sq += outcome * outcome;
        if let Some(result) = GameResult::from_score(outcome) {
            self.tally.record(result);
        }

        self.llr = self.config.llr(self.n, self.mean(), self.variance());
        self.trace.push((self.n, self.llr));

        if self.n < self.config.min_games {
            return Step::Continue;
        }

        let decision = match self.config.classify(self.llr) {
            Some(decision) => decision,
            None if self.n >= self.config.max_games => Decision::Inconclusive,
            None => return Step::Continue,
        };
        self.decision = Some(decision);
        Step::Stop(decision)
    }

    pub fn samples(&self) -> u32 {
        self.n
    }

    pub fn score(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum / self.n as f64
    }

    /// Population variance, not floored
    pub fn variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.n as f64 - mean * mean).max(0.0)
    }

    pub fn llr(&self) -> f64 {
        self.llr
    }

    pub fn decision(&self) -> Option<Decision> {
        self.decision
    }

    pub fn is_finished(&self) -> bool {
        self.decision.is_some()
    }

    /// `(sample count, llr)` after every outcome pushed so far
    pub fn trace(&self) -> &[(u32, f64)] {
        &self.trace
    }

    /// Snapshot of the test. Undecided states report `Inconclusive`.
    pub fn finish(&self) -> SprtResult {
        SprtResult {
            decision: self.decision.unwrap_or(Decision::Inconclusive),
            games: self.n,
            score: self.sum,
            llr: self.llr,
            wins: self.tally.wins,
            draws: self.tally.draws,
            losses: self.tally.losses,
        }
    }
}

#[cfg(test)]
#[path = "sprt_tests.rs"]
mod sprt_tests;
