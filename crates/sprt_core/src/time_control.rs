//! Time controls for engine matches.
//!
//! Two shapes are supported, using the notation match tools understand:
//!
//! - `st=<seconds>`: a fixed budget per move,
//! - `[moves/]base[+increment]`: a game clock in seconds, optionally
//!   replenished every `moves` moves, with a per-move increment.
//!
//! Besides the engine-facing budget, this module derives how long the
//! harness should wait for a game or a whole session before declaring the
//! external process hung.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Plies assumed for an average game when estimating wall-clock time
pub const TYPICAL_GAME_PLIES: u32 = 160;

/// Multiplier applied to estimated durations before declaring a timeout
const TIMEOUT_SAFETY_FACTOR: u32 = 3;

/// Fixed allowance added on top of every session timeout (engine startup,
/// tool bookkeeping)
const TIMEOUT_SLACK: Duration = Duration::from_secs(60);

/// How much thinking time engines get
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeControl {
    /// Fixed time per move
    MoveTime(Duration),
    /// Game clock
    Clock {
        /// Moves per period; `None` means the whole game is one period
        moves: Option<u32>,
        base: Duration,
        increment: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeControlError {
    #[error("empty time control")]
    Empty,

    #[error("invalid number {value:?} in time control {input:?}")]
    InvalidNumber { input: String, value: String },

    #[error("time control {0:?} gives no thinking time")]
    ZeroTime(String),
}

impl TimeControl {
    /// Fixed time per move, in milliseconds
    pub fn move_time_ms(ms: u64) -> Self {
        TimeControl::MoveTime(Duration::from_millis(ms.max(1)))
    }

    /// Sudden-death clock with increment, in seconds
    pub fn clock(base_secs: f64, increment_secs: f64) -> Self {
        TimeControl::Clock {
            moves: None,
            base: millis_from_secs(base_secs),
            increment: millis_from_secs(increment_secs),
        }
    }

    /// Argument understood by fastchess-style match tools (`st=` or `tc=`)
    pub fn tool_arg(&self) -> String {
        match self {
            TimeControl::MoveTime(_) => self.to_string(),
            TimeControl::Clock { .. } => format!("tc={}", self),
        }
    }

    /// Longest a single reply may take given the mover's remaining clock.
    ///
    /// The increment is credited only once the move is made, so it never
    /// extends the current reply. For fixed move time the clock is
    /// irrelevant.
    pub fn move_allowance(&self, remaining: Duration) -> Duration {
        match *self {
            TimeControl::MoveTime(per_move) => per_move,
            TimeControl::Clock { .. } => remaining,
        }
    }

    /// Rough wall-clock duration of one game of `plies` half-moves
    pub fn estimated_game_duration(&self, plies: u32) -> Duration {
        match *self {
            TimeControl::MoveTime(per_move) => per_move * plies,
            TimeControl::Clock {
                moves,
                base,
                increment,
            } => {
                let moves_per_side = plies.div_ceil(2);
                let periods = match moves {
                    Some(m) if m > 0 => moves_per_side.div_ceil(m).max(1),
                    _ => 1,
                };
                (base * periods + increment * moves_per_side) * 2
            }
        }
    }

    /// How long to wait for a whole session of `games` games played
    /// `concurrency` at a time before treating the tool as hung
    pub fn session_timeout(&self, games: u32, concurrency: u32) -> Duration {
        let rounds = games.max(1).div_ceil(concurrency.max(1));
        self.estimated_game_duration(TYPICAL_GAME_PLIES) * rounds * TIMEOUT_SAFETY_FACTOR
            + TIMEOUT_SLACK
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        TimeControl::clock(10.0, 0.1)
    }
}

/// Seconds to a whole-millisecond duration; time controls never need finer
fn millis_from_secs(secs: f64) -> Duration {
    Duration::from_millis((secs.max(0.0) * 1000.0).round() as u64)
}

fn to_secs(d: Duration) -> f64 {
    d.as_millis() as f64 / 1000.0
}

fn parse_secs(input: &str, value: &str) -> Result<Duration, TimeControlError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(millis_from_secs)
        .ok_or_else(|| TimeControlError::InvalidNumber {
            input: input.to_string(),
            value: value.to_string(),
        })
}

impl FromStr for TimeControl {
    type Err = TimeControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TimeControlError::Empty);
        }

        if let Some(secs) = input.strip_prefix("st=") {
            let per_move = parse_secs(input, secs)?;
            if per_move.is_zero() {
                return Err(TimeControlError::ZeroTime(input.to_string()));
            }
            return Ok(TimeControl::MoveTime(per_move));
        }

        let body = input.strip_prefix("tc=").unwrap_or(input);
        let (moves, rest) = match body.split_once('/') {
            Some((moves, rest)) => {
                let moves = moves
                    .parse::<u32>()
                    .map_err(|_| TimeControlError::InvalidNumber {
                        input: input.to_string(),
                        value: moves.to_string(),
                    })?;
                (Some(moves), rest)
            }
            None => (None, body),
        };
        let (base, increment) = match rest.split_once('+') {
            Some((base, inc)) => (parse_secs(input, base)?, parse_secs(input, inc)?),
            None => (parse_secs(input, rest)?, Duration::ZERO),
        };
        if base.is_zero() && increment.is_zero() {
            return Err(TimeControlError::ZeroTime(input.to_string()));
        }
        Ok(TimeControl::Clock {
            moves,
            base,
            increment,
        })
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeControl::MoveTime(per_move) => {
                write!(f, "st={:.3}", to_secs(*per_move).max(0.001))
            }
            TimeControl::Clock {
                moves,
                base,
                increment,
            } => {
                if let Some(m) = moves {
                    write!(f, "{}/", m)?;
                }
                write!(f, "{}", to_secs(*base))?;
                if !increment.is_zero() {
                    write!(f, "+{}", to_secs(*increment))?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<String> for TimeControl {
    type Error = TimeControlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeControl> for String {
    fn from(tc: TimeControl) -> Self {
        tc.to_string()
    }
}

#[cfg(test)]
#[path = "time_control_tests.rs"]
mod time_control_tests;
