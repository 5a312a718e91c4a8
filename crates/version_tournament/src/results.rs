//! Run results storage and reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use sprt_core::{SprtConfig, SprtResult};

use crate::error::ReportError;
use crate::ranking::RankingEntry;

/// How a pair ended up in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairStatus {
    /// The match ran and the SPRT produced a decision
    Decided,
    /// The match tool failed; folded as inconclusive with zero games
    MatchError { message: String },
    /// One side has no binary
    Skipped { reason: String },
    /// The run was cancelled before this pair started
    Cancelled,
}

/// One unordered pair, challenger first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub challenger: String,
    pub opponent: String,
    /// Match seed; `None` when the pair was never played
    pub seed: Option<u64>,
    pub status: PairStatus,
    pub result: SprtResult,
    pub elapsed_secs: f64,
}

impl PairReport {
    pub fn status_text(&self) -> String {
        match &self.status {
            PairStatus::Decided => self.result.decision.to_string(),
            PairStatus::MatchError { .. } => "ERROR".to_string(),
            PairStatus::Skipped { .. } => "SKIPPED".to_string(),
            PairStatus::Cancelled => "CANCELLED".to_string(),
        }
    }
}

/// Build outcome of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: String,
    pub label: String,
    pub binary: Option<PathBuf>,
    /// Build log written on failure
    pub log: Option<PathBuf>,
    pub error: Option<String>,
}

/// Settings a run was made with, kept for reproducing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub revisions: String,
    pub strategy: String,
    pub time_control: String,
    pub games_per_match: u32,
    pub base_seed: u64,
    pub sprt: SprtConfig,
}

/// Complete run results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub settings: RunSettings,
    pub builds: Vec<BuildReport>,
    pub pairs: Vec<PairReport>,
    /// Best first
    pub ranking: Vec<RankingEntry>,
}

impl RunReport {
    pub fn best(&self) -> Option<&RankingEntry> {
        self.ranking.first()
    }

    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Markdown scoreboard and pair table
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let s = &self.settings;
        let _ = writeln!(md, "# Version SPRT: `{}`\n", s.revisions);
        let _ = writeln!(
            md,
            "Started {}, finished {}. Strategy {}, tc {}, {} games/pair, seed {}.\n",
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339(),
            s.strategy,
            s.time_control,
            s.games_per_match,
            s.base_seed
        );
        let _ = writeln!(
            md,
            "SPRT elo0={} elo1={} alpha={} beta={}\n",
            s.sprt.elo0, s.sprt.elo1, s.sprt.alpha, s.sprt.beta
        );

        md.push_str("## Scoreboard\n\n");
        md.push_str("| # | Version | W | L | I | Points | Games | Score | Label |\n");
        md.push_str("|---|---------|---|---|---|--------|-------|-------|-------|\n");
        for (rank, e) in self.ranking.iter().enumerate() {
            let label = if e.built {
                e.label.clone()
            } else {
                format!("{} *(build failed)*", e.label)
            };
            let _ = writeln!(
                md,
                "| {} | `{}` | {} | {} | {} | {:.1} | {} | {:.1}% | {} |",
                rank + 1,
                e.short,
                e.wins,
                e.losses,
                e.inconclusive,
                e.points,
                e.games,
                e.score_rate() * 100.0,
                label
            );
        }
        if let Some(best) = self.best() {
            let _ = writeln!(md, "\n**Best version:** `{}` {}", best.short, best.label);
        }

        md.push_str("\n## Pairs\n\n");
        md.push_str("| Challenger | Opponent | Result | W-D-L | Games | LLR |\n");
        md.push_str("|------------|----------|--------|-------|-------|-----|\n");
        for p in &self.pairs {
            let _ = writeln!(
                md,
                "| `{}` | `{}` | {} | {} | {} | {:.3} |",
                crate::resolver::short_id(&p.challenger),
                crate::resolver::short_id(&p.opponent),
                p.status_text(),
                p.result.score_line(),
                p.result.games,
                p.result.llr
            );
        }

        let failed: Vec<&BuildReport> = self.builds.iter().filter(|b| b.binary.is_none()).collect();
        if !failed.is_empty() {
            md.push_str("\n## Build failures\n\n");
            for b in failed {
                let _ = writeln!(
                    md,
                    "- `{}` {}: {}{}",
                    crate::resolver::short_id(&b.id),
                    b.label,
                    b.error.as_deref().unwrap_or("unknown error"),
                    b.log
                        .as_ref()
                        .map(|l| format!(" (log: {})", l.display()))
                        .unwrap_or_default()
                );
            }
        }
        md
    }

    /// Print the pair results to stdout
    pub fn print_pairs(&self) {
        println!("\n=== Pairs ===");
        for p in &self.pairs {
            println!(
                "{} vs {}: {} ({}, games={}, llr={:.3})",
                crate::resolver::short_id(&p.challenger),
                crate::resolver::short_id(&p.opponent),
                p.status_text(),
                p.result.score_line(),
                p.result.games,
                p.result.llr
            );
        }
    }
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod results_tests;
