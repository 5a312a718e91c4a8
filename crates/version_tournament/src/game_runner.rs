//! Single-game driver.
//!
//! Plays games between two [`EngineAdapter`]s under a [`TimeControl`] and
//! feeds each outcome, challenger's view, into a running [`SprtState`] until
//! it stops. Game rules stay with the engines: a game ends when the side to
//! move has no move, runs out of time, or the ply cap is reached.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::time::{Duration, Instant};

use sprt_core::{GameResult, SprtConfig, SprtResult, SprtState, Step, TimeControl};

use crate::error::MatchToolError;
use crate::match_runner::PairEvaluator;
use crate::openings::{white_to_move, STARTPOS};
use crate::pipeline::Version;
use crate::uci_client::UciEngine;

/// Games longer than this many plies are adjudicated drawn
pub const DEFAULT_MAX_PLIES: u32 = 400;

/// Slack on top of the move allowance before a reply counts as a forfeit
pub const DEFAULT_GRACE: Duration = Duration::from_millis(250);

/// Search limits for one `go`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoLimits {
    MoveTime(Duration),
    Clock {
        wtime: Duration,
        btime: Duration,
        winc: Duration,
        binc: Duration,
        movestogo: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineReply {
    /// Move in long algebraic notation
    Move(String),
    /// No legal move; `mated` when the engine's last score was mate 0
    NoMove { mated: bool },
    /// Nothing arrived before the deadline
    NoReply,
}

/// One engine, as seen by the game driver
pub trait EngineAdapter: Send {
    fn name(&self) -> &str;

    fn new_game(&mut self) -> Result<(), MatchToolError>;

    /// Position to search next: an opening FEN plus the moves played since
    fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), MatchToolError>;

    /// Searches the current position, waiting at most `deadline` for the reply
    fn go(&mut self, limits: &GoLimits, deadline: Duration) -> Result<EngineReply, MatchToolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    MaxPlies,
    TimeForfeit,
}

/// A finished game
#[derive(Debug, Clone, Serialize)]
pub struct GameRecord {
    pub opening: String,
    pub white: String,
    pub black: String,
    pub moves: Vec<String>,
    /// From white's perspective
    pub result: GameResult,
    pub termination: Termination,
}

/// Both sides' clocks
#[derive(Debug, Clone)]
struct Clocks {
    remaining: [Duration; 2],
    moves_made: [u32; 2],
}

/// Plays games under one time control
#[derive(Debug, Clone)]
pub struct GameRunner {
    time_control: TimeControl,
    max_plies: u32,
    grace: Duration,
}

impl GameRunner {
    pub fn new(time_control: TimeControl) -> Self {
        Self {
            time_control,
            max_plies: DEFAULT_MAX_PLIES,
            grace: DEFAULT_GRACE,
        }
    }

    pub fn with_max_plies(mut self, max_plies: u32) -> Self {
        self.max_plies = max_plies;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn start_clocks(&self) -> Clocks {
        let base = match self.time_control {
            TimeControl::MoveTime(_) => Duration::ZERO,
            TimeControl::Clock { base, .. } => base,
        };
        Clocks {
            remaining: [base; 2],
            moves_made: [0; 2],
        }
    }

    fn limits(&self, clocks: &Clocks, side: usize) -> GoLimits {
        match self.time_control {
            TimeControl::MoveTime(per_move) => GoLimits::MoveTime(per_move),
            TimeControl::Clock {
                moves, increment, ..
            } => GoLimits::Clock {
                wtime: clocks.remaining[0],
                btime: clocks.remaining[1],
                winc: increment,
                binc: increment,
                movestogo: moves
                    .filter(|m| *m > 0)
                    .map(|m| m - clocks.moves_made[side] % m),
            },
        }
    }

    fn charge(&self, clocks: &mut Clocks, side: usize, elapsed: Duration) {
        if let TimeControl::Clock {
            moves,
            base,
            increment,
        } = self.time_control
        {
            clocks.remaining[side] = clocks.remaining[side].saturating_sub(elapsed) + increment;
            clocks.moves_made[side] += 1;
            if moves.is_some_and(|m| m > 0 && clocks.moves_made[side] % m == 0) {
                clocks.remaining[side] += base;
            }
        }
    }

    /// Plays one game from `opening`. The result is from white's view.
    pub fn play_game(
        &self,
        white: &mut dyn EngineAdapter,
        black: &mut dyn EngineAdapter,
        opening: &str,
    ) -> Result<GameRecord, MatchToolError> {
        white.new_game()?;
        black.new_game()?;

        let mut clocks = self.start_clocks();
        let mut white_moves = white_to_move(opening);
        let mut moves: Vec<String> = Vec::new();

        let (result, termination) = loop {
            if moves.len() as u32 >= self.max_plies {
                break (GameResult::Draw, Termination::MaxPlies);
            }

            let side = if white_moves { 0 } else { 1 };
            let mover: &mut dyn EngineAdapter = if white_moves { &mut *white } else { &mut *black };
            let mover_loses = if white_moves {
                GameResult::Loss
            } else {
                GameResult::Win
            };
            let allowance = self.time_control.move_allowance(clocks.remaining[side]);
            let limits = self.limits(&clocks, side);

            mover.set_position(opening, &moves)?;
            let started = Instant::now();
            let reply = mover.go(&limits, allowance + self.grace)?;
            let elapsed = started.elapsed();

            match reply {
                EngineReply::NoReply => break (mover_loses, Termination::TimeForfeit),
                EngineReply::NoMove { mated: true } => break (mover_loses, Termination::Checkmate),
                EngineReply::NoMove { mated: false } => {
                    break (GameResult::Draw, Termination::Stalemate)
                }
                EngineReply::Move(_) if elapsed > allowance + self.grace => {
                    tracing::debug!(engine = mover.name(), ?elapsed, ?allowance, "move over time");
                    break (mover_loses, Termination::TimeForfeit);
                }
                EngineReply::Move(mv) => {
                    moves.push(mv);
                    self.charge(&mut clocks, side, elapsed);
                    white_moves = !white_moves;
                }
            }
        };

        Ok(GameRecord {
            opening: opening.to_string(),
            white: white.name().to_string(),
            black: black.name().to_string(),
            moves,
            result,
            termination,
        })
    }

    /// Plays seeded opening pairs, colors reversed within each pair, until
    /// the sequential test stops
    pub fn run_pair_sprt(
        &self,
        challenger: &mut dyn EngineAdapter,
        opponent: &mut dyn EngineAdapter,
        openings: &[String],
        sprt: &SprtConfig,
        seed: u64,
    ) -> Result<PairGames, MatchToolError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut state = SprtState::new(*sprt);
        let mut games = Vec::new();

        'openings: loop {
            let opening = openings
                .choose(&mut rng)
                .map(String::as_str)
                .unwrap_or(STARTPOS);

            for challenger_white in [true, false] {
                let record = if challenger_white {
                    self.play_game(challenger, opponent, opening)?
                } else {
                    self.play_game(opponent, challenger, opening)?
                };
                let outcome = if challenger_white {
                    record.result
                } else {
                    record.result.flipped()
                };
                tracing::debug!(
                    white = %record.white,
                    black = %record.black,
                    result = record.result.as_pgn(),
                    termination = ?record.termination,
                    plies = record.moves.len(),
                    "game finished"
                );
                games.push(record);

                if let Step::Stop(decision) = state.push_result(outcome) {
                    tracing::debug!(%decision, games = state.samples(), llr = state.llr(), "sprt stopped");
                    break 'openings;
                }
            }
        }

        Ok(PairGames {
            result: state.finish(),
            games,
        })
    }
}

/// A decided pair together with every game played for it
#[derive(Debug, Clone)]
pub struct PairGames {
    pub result: SprtResult,
    pub games: Vec<GameRecord>,
}

/// Plays each pair game by game through UCI engine processes
pub struct GameEvaluator {
    runner: GameRunner,
    openings: Vec<String>,
    sprt: SprtConfig,
    options: Vec<(String, String)>,
    handshake_timeout: Duration,
}

impl GameEvaluator {
    pub fn new(
        runner: GameRunner,
        openings: Vec<String>,
        sprt: SprtConfig,
        hash_mb: u32,
        threads: u32,
    ) -> Self {
        let mut options = vec![("Hash".to_string(), hash_mb.to_string())];
        if threads > 1 {
            options.push(("Threads".to_string(), threads.to_string()));
        }
        Self {
            runner,
            openings,
            sprt,
            options,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl PairEvaluator for GameEvaluator {
    fn evaluate(
        &self,
        challenger: &Version,
        opponent: &Version,
        seed: u64,
    ) -> Result<SprtResult, MatchToolError> {
        let mut a = UciEngine::start(
            &challenger.binary,
            &challenger.short,
            &self.options,
            self.handshake_timeout,
        )?;
        let mut b = UciEngine::start(
            &opponent.binary,
            &opponent.short,
            &self.options,
            self.handshake_timeout,
        )?;
        let pair = self
            .runner
            .run_pair_sprt(&mut a, &mut b, &self.openings, &self.sprt, seed)?;
        Ok(pair.result)
    }
}

#[cfg(test)]
#[path = "game_runner_tests.rs"]
mod game_runner_tests;
