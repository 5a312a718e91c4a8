//! Pairwise SPRT decisions folded into per-version tallies and a total order

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sprt_core::{Decision, SprtResult};

use crate::resolver::short_id;

/// Standing of one version across every pair it took part in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub id: String,
    pub short: String,
    pub label: String,
    /// Pairs where this version was accepted as the stronger side
    pub wins: u32,
    /// Pairs where the other side was accepted as stronger
    pub losses: u32,
    pub inconclusive: u32,
    /// Game points scored across all pairs
    pub points: f64,
    pub games: u32,
    /// False when the build failed; the version then never plays
    pub built: bool,
}

impl RankingEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>, built: bool) -> Self {
        let id = id.into();
        Self {
            short: short_id(&id).to_string(),
            id,
            label: label.into(),
            wins: 0,
            losses: 0,
            inconclusive: 0,
            points: 0.0,
            games: 0,
            built,
        }
    }

    /// Pair wins minus pair losses
    pub fn net(&self) -> i64 {
        self.wins as i64 - self.losses as i64
    }

    /// Points per game, 0.5 when nothing was played
    pub fn score_rate(&self) -> f64 {
        if self.games == 0 {
            return 0.5;
        }
        self.points / self.games as f64
    }

    /// Best first: net pair wins, score rate, pair wins, fewest pair losses
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        other
            .net()
            .cmp(&self.net())
            .then_with(|| other.score_rate().total_cmp(&self.score_rate()))
            .then_with(|| other.wins.cmp(&self.wins))
            .then_with(|| self.losses.cmp(&other.losses))
    }
}

/// Sorts best first; entries that compare equal keep their input order
pub fn rank(mut entries: Vec<RankingEntry>) -> Vec<RankingEntry> {
    entries.sort_by(RankingEntry::ranking_cmp);
    entries
}

/// Shared tally of a run. Pairs may finish on any thread.
#[derive(Debug)]
pub struct Scoreboard {
    entries: Mutex<Vec<RankingEntry>>,
    index: HashMap<String, usize>,
}

impl Scoreboard {
    /// One entry per resolved version, in resolution order
    pub fn new(entries: Vec<RankingEntry>) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self {
            entries: Mutex::new(entries),
            index,
        }
    }

    /// Folds one pair's result; `challenger` is the side the result is
    /// expressed for
    pub fn record(&self, challenger: &str, opponent: &str, result: &SprtResult) {
        let (Some(&a), Some(&b)) = (self.index.get(challenger), self.index.get(opponent)) else {
            tracing::warn!(challenger, opponent, "result for unknown version ignored");
            return;
        };
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        match result.decision {
            Decision::H1 => {
                entries[a].wins += 1;
                entries[b].losses += 1;
            }
            Decision::H0 => {
                entries[b].wins += 1;
                entries[a].losses += 1;
            }
            Decision::Inconclusive => {
                entries[a].inconclusive += 1;
                entries[b].inconclusive += 1;
            }
        }
        entries[a].points += result.score;
        entries[b].points += result.games as f64 - result.score;
        entries[a].games += result.games;
        entries[b].games += result.games;
    }

    /// Current tallies in resolution order
    pub fn snapshot(&self) -> Vec<RankingEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn ranked(&self) -> Vec<RankingEntry> {
        rank(self.snapshot())
    }

    pub fn best(&self) -> Option<RankingEntry> {
        self.ranked().into_iter().next()
    }
}

/// Print the scoreboard to stdout
pub fn print_scoreboard(ranked: &[RankingEntry]) {
    println!("\n=== Scoreboard (pairwise SPRT) ===");
    println!(
        "{:<4} {:<10} {:>4} {:>4} {:>4} {:>8} {:>7}  {}",
        "#", "Version", "W", "L", "I", "Points", "Games", "Label"
    );
    println!("{}", "-".repeat(72));
    for (rank, e) in ranked.iter().enumerate() {
        let label = if e.built {
            e.label.clone()
        } else {
            format!("{} (build failed)", e.label)
        };
        println!(
            "{:<4} {:<10} {:>4} {:>4} {:>4} {:>8.1} {:>7}  {}",
            rank + 1,
            e.short,
            e.wins,
            e.losses,
            e.inconclusive,
            e.points,
            e.games,
            label
        );
    }
    if let Some(best) = ranked.first() {
        println!("\nBest version: {} {}", best.short, best.label);
    }
}

#[cfg(test)]
#[path = "ranking_tests.rs"]
mod ranking_tests;
