use super::*;
use sprt_core::Decision;
use std::thread;

/// In-memory engine with a fixed behaviour
struct FakeEngine {
    name: &'static str,
    behaviour: Behaviour,
    delay: Duration,
    positions: Vec<(String, usize)>,
    limits_seen: Vec<GoLimits>,
}

#[derive(Clone, Copy)]
enum Behaviour {
    /// Always plays a move
    Moves,
    /// Always reports checkmate against itself
    Mated,
    /// Always reports stalemate
    Stalemated,
    /// Never answers
    Silent,
}

impl FakeEngine {
    fn new(name: &'static str, behaviour: Behaviour) -> Self {
        Self {
            name,
            behaviour,
            delay: Duration::ZERO,
            positions: Vec::new(),
            limits_seen: Vec::new(),
        }
    }
}

impl EngineAdapter for FakeEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn new_game(&mut self) -> Result<(), MatchToolError> {
        Ok(())
    }

    fn set_position(&mut self, fen: &str, moves: &[String]) -> Result<(), MatchToolError> {
        self.positions.push((fen.to_string(), moves.len()));
        Ok(())
    }

    fn go(&mut self, limits: &GoLimits, _deadline: Duration) -> Result<EngineReply, MatchToolError> {
        self.limits_seen.push(*limits);
        thread::sleep(self.delay);
        Ok(match self.behaviour {
            Behaviour::Moves => EngineReply::Move("a1a2".to_string()),
            Behaviour::Mated => EngineReply::NoMove { mated: true },
            Behaviour::Stalemated => EngineReply::NoMove { mated: false },
            Behaviour::Silent => EngineReply::NoReply,
        })
    }
}

const BLACK_TO_MOVE: &str = "8/8/8/8/8/8/8/K6k b - - 0 1";

fn runner() -> GameRunner {
    GameRunner::new(TimeControl::move_time_ms(50)).with_max_plies(20)
}

#[test]
fn test_checkmate_scored_against_side_to_move() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    let mut black = FakeEngine::new("b", Behaviour::Mated);

    let game = runner().play_game(&mut white, &mut black, STARTPOS).unwrap();
    assert_eq!(game.result, GameResult::Win);
    assert_eq!(game.termination, Termination::Checkmate);
    assert_eq!(game.moves, vec!["a1a2".to_string()]);
    assert_eq!(black.positions, vec![(STARTPOS.to_string(), 1)]);
}

#[test]
fn test_opening_side_to_move_is_respected() {
    let mut white = FakeEngine::new("w", Behaviour::Mated);
    let mut black = FakeEngine::new("b", Behaviour::Mated);

    let game = runner().play_game(&mut white, &mut black, BLACK_TO_MOVE).unwrap();
    assert_eq!(game.result, GameResult::Win);
    assert!(white.positions.is_empty());
}

#[test]
fn test_stalemate_is_draw() {
    let mut white = FakeEngine::new("w", Behaviour::Stalemated);
    let mut black = FakeEngine::new("b", Behaviour::Moves);

    let game = runner().play_game(&mut white, &mut black, STARTPOS).unwrap();
    assert_eq!(game.result, GameResult::Draw);
    assert_eq!(game.termination, Termination::Stalemate);
}

#[test]
fn test_ply_cap_adjudicates_draw() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    let mut black = FakeEngine::new("b", Behaviour::Moves);

    let game = runner().play_game(&mut white, &mut black, STARTPOS).unwrap();
    assert_eq!(game.result, GameResult::Draw);
    assert_eq!(game.termination, Termination::MaxPlies);
    assert_eq!(game.moves.len(), 20);
}

#[test]
fn test_no_reply_forfeits() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    let mut black = FakeEngine::new("b", Behaviour::Silent);

    let game = runner().play_game(&mut white, &mut black, STARTPOS).unwrap();
    assert_eq!(game.result, GameResult::Win);
    assert_eq!(game.termination, Termination::TimeForfeit);
}

#[test]
fn test_slow_reply_forfeits() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    white.delay = Duration::from_millis(80);
    let mut black = FakeEngine::new("b", Behaviour::Moves);

    let game = GameRunner::new(TimeControl::move_time_ms(10))
        .with_grace(Duration::from_millis(10))
        .play_game(&mut white, &mut black, STARTPOS)
        .unwrap();
    assert_eq!(game.result, GameResult::Loss);
    assert_eq!(game.termination, Termination::TimeForfeit);
}

#[test]
fn test_increment_does_not_cover_an_overrun_clock() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    white.delay = Duration::from_millis(120);
    let mut black = FakeEngine::new("b", Behaviour::Moves);

    // 50ms on the clock, a full second of increment still to come
    let game = GameRunner::new(TimeControl::clock(0.05, 1.0))
        .with_grace(Duration::from_millis(10))
        .play_game(&mut white, &mut black, STARTPOS)
        .unwrap();
    assert_eq!(game.result, GameResult::Loss);
    assert_eq!(game.termination, Termination::TimeForfeit);
    assert!(game.moves.is_empty());
}

#[test]
fn test_clock_limits_are_reported() {
    let mut white = FakeEngine::new("w", Behaviour::Moves);
    let mut black = FakeEngine::new("b", Behaviour::Moves);

    GameRunner::new("40/60+1".parse().unwrap())
        .with_max_plies(4)
        .play_game(&mut white, &mut black, STARTPOS)
        .unwrap();

    match white.limits_seen[0] {
        GoLimits::Clock {
            wtime,
            btime,
            winc,
            movestogo,
            ..
        } => {
            assert_eq!(wtime, Duration::from_secs(60));
            assert_eq!(btime, Duration::from_secs(60));
            assert_eq!(winc, Duration::from_secs(1));
            assert_eq!(movestogo, Some(40));
        }
        other => panic!("unexpected limits {other:?}"),
    }
    match white.limits_seen[1] {
        GoLimits::Clock {
            wtime, movestogo, ..
        } => {
            // one instant move charged, one increment credited
            assert!(wtime > Duration::from_secs(60));
            assert_eq!(movestogo, Some(39));
        }
        other => panic!("unexpected limits {other:?}"),
    }
}

fn sprt() -> SprtConfig {
    SprtConfig {
        min_games: 20,
        max_games: 60,
        ..Default::default()
    }
}

#[test]
fn test_pair_alternates_colors_per_opening() {
    let mut strong = FakeEngine::new("strong", Behaviour::Moves);
    let mut weak = FakeEngine::new("weak", Behaviour::Mated);
    let openings = vec![STARTPOS.to_string(), BLACK_TO_MOVE.to_string()];

    let pair = runner()
        .run_pair_sprt(&mut strong, &mut weak, &openings, &sprt(), 7)
        .unwrap();

    assert_eq!(pair.result.decision, Decision::H1);
    assert_eq!(pair.result.games, 20);
    assert_eq!(pair.result.wins, 20);
    assert_eq!(pair.games.len(), 20);
    for game in pair.games.chunks(2) {
        assert_eq!(game[0].opening, game[1].opening);
        assert_eq!(game[0].white, "strong");
        assert_eq!(game[1].white, "weak");
    }
}

#[test]
fn test_weaker_challenger_is_rejected() {
    let mut weak = FakeEngine::new("weak", Behaviour::Mated);
    let mut strong = FakeEngine::new("strong", Behaviour::Moves);

    let pair = runner()
        .run_pair_sprt(&mut weak, &mut strong, &[STARTPOS.to_string()], &sprt(), 7)
        .unwrap();
    assert_eq!(pair.result.decision, Decision::H0);
    assert_eq!(pair.result.losses, 20);
}

#[test]
fn test_drawn_pair_accepts_null() {
    let mut a = FakeEngine::new("a", Behaviour::Moves);
    let mut b = FakeEngine::new("b", Behaviour::Moves);

    let pair = GameRunner::new(TimeControl::move_time_ms(50))
        .with_max_plies(2)
        .run_pair_sprt(&mut a, &mut b, &[STARTPOS.to_string()], &sprt(), 1)
        .unwrap();
    assert_eq!(pair.result.decision, Decision::H0);
    assert_eq!(pair.result.games, 20);
    assert_eq!(pair.result.draws, 20);
}

#[test]
fn test_opening_sequence_is_seeded() {
    let openings: Vec<String> = (1..=8)
        .map(|n| format!("8/8/8/8/8/8/{n}/K6k w - - 0 1"))
        .collect();
    let play = |seed| {
        let mut a = FakeEngine::new("a", Behaviour::Moves);
        let mut b = FakeEngine::new("b", Behaviour::Mated);
        runner()
            .run_pair_sprt(&mut a, &mut b, &openings, &sprt(), seed)
            .unwrap()
            .games
            .into_iter()
            .map(|g| g.opening)
            .collect::<Vec<_>>()
    };
    assert_eq!(play(11), play(11));
}
