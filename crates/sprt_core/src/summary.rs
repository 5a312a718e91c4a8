//! Classification of pre-aggregated match summaries
//!
//! When a whole session is delegated to an external match tool, the only
//! thing that comes back is a summary: totals, maybe the tool's own LLR and
//! bounds, maybe a literal verdict. [`SessionSummary::classify`] turns that
//! into the same [`SprtResult`] the incremental test produces.

use serde::{Deserialize, Serialize};

use crate::outcome::GameTally;
use crate::sprt::{classify_llr, Decision, SprtConfig, SprtResult};

/// LLR value and decision bounds as reported by a match tool
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LlrReport {
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Totals of a finished match session, challenger's perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub games: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: f64,
    /// The tool's own LLR triple, if it printed one
    pub llr: Option<LlrReport>,
    /// A verdict the tool stated explicitly, if any
    pub verdict: Option<Decision>,
}

impl SessionSummary {
    pub fn tally(&self) -> GameTally {
        GameTally {
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
        }
    }

    /// Reconstructs the LLR from the win/draw/loss totals, treating the whole
    /// batch as the final sample.
    pub fn reconstructed_llr(&self, config: &SprtConfig) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        let mean = self.points / self.games as f64;
        let variance = self.tally().variance_around(mean);
        config.llr(self.games, mean, variance)
    }

    /// Three-way classification.
    ///
    /// An explicit verdict wins. Otherwise the tool's LLR is compared with
    /// the tool's bounds, and without a reported LLR the value is
    /// reconstructed from the totals and compared with `config`'s bounds.
    pub fn classify(&self, config: &SprtConfig) -> SprtResult {
        let (llr, lower, upper) = match self.llr {
            Some(report) => (report.value, report.lower, report.upper),
            None => (
                self.reconstructed_llr(config),
                config.lower_bound(),
                config.upper_bound(),
            ),
        };
        let decision = self
            .verdict
            .or_else(|| classify_llr(llr, lower, upper))
            .unwrap_or(Decision::Inconclusive);

        SprtResult {
            decision,
            games: self.games,
            score: self.points,
            llr,
            wins: self.wins,
            draws: self.draws,
            losses: self.losses,
        }
    }
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod summary_tests;
