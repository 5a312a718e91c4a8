//! Game outcomes and win/draw/loss tallies

use serde::{Deserialize, Serialize};

/// Result of a single game from the challenger's perspective
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// Scalar outcome: 1 for a win, 0.5 for a draw, 0 for a loss
    pub fn score(self) -> f64 {
        match self {
            GameResult::Win => 1.0,
            GameResult::Draw => 0.5,
            GameResult::Loss => 0.0,
        }
    }

    /// The same game seen from the other side of the board
    pub fn flipped(self) -> Self {
        match self {
            GameResult::Win => GameResult::Loss,
            GameResult::Loss => GameResult::Win,
            GameResult::Draw => GameResult::Draw,
        }
    }

    /// Maps an exact scalar outcome back to a result.
    ///
    /// Fractional samples other than 0.5 have no game-level meaning and
    /// return `None`.
    pub fn from_score(score: f64) -> Option<Self> {
        if score == 1.0 {
            Some(GameResult::Win)
        } else if score == 0.5 {
            Some(GameResult::Draw)
        } else if score == 0.0 {
            Some(GameResult::Loss)
        } else {
            None
        }
    }

    /// PGN-style result string from white's perspective
    pub fn as_pgn(self) -> &'static str {
        match self {
            GameResult::Win => "1-0",
            GameResult::Loss => "0-1",
            GameResult::Draw => "1/2-1/2",
        }
    }
}

/// Win/draw/loss counts for one side of a pairing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameTally {
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl GameTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: GameResult) {
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Draw => self.draws += 1,
            GameResult::Loss => self.losses += 1,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.wins + self.draws + self.losses
    }

    /// Points scored (1 per win, 0.5 per draw)
    pub fn points(&self) -> f64 {
        self.wins as f64 + 0.5 * self.draws as f64
    }

    /// Points per game, 0.5 when nothing has been played
    pub fn score_rate(&self) -> f64 {
        let total = self.total_games();
        if total == 0 {
            return 0.5;
        }
        self.points() / total as f64
    }

    /// Population variance of the per-game scores around `mean`
    pub fn variance_around(&self, mean: f64) -> f64 {
        let total = self.total_games();
        if total == 0 {
            return 0.0;
        }
        let w = self.wins as f64 * (1.0 - mean).powi(2);
        let d = self.draws as f64 * (0.5 - mean).powi(2);
        let l = self.losses as f64 * mean.powi(2);
        (w + d + l) / total as f64
    }

    /// The tally seen from the opponent's side
    pub fn flipped(&self) -> Self {
        Self {
            wins: self.losses,
            draws: self.draws,
            losses: self.wins,
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod outcome_tests;
