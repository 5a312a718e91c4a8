use super::*;

fn summary(wins: u32, draws: u32, losses: u32) -> SessionSummary {
    SessionSummary {
        games: wins + draws + losses,
        wins,
        losses,
        draws,
        points: wins as f64 + 0.5 * draws as f64,
        llr: None,
        verdict: None,
    }
}

#[test]
fn test_explicit_verdict_wins() {
    let mut s = summary(10, 0, 90);
    s.verdict = Some(Decision::H1);
    s.llr = Some(LlrReport {
        value: -5.0,
        lower: -2.94,
        upper: 2.94,
    });
    let result = s.classify(&SprtConfig::default());
    assert_eq!(result.decision, Decision::H1);
    assert_eq!(result.llr, -5.0);
}

#[test]
fn test_tool_llr_uses_tool_bounds() {
    let mut s = summary(50, 0, 50);
    s.llr = Some(LlrReport {
        value: 1.5,
        lower: -1.0,
        upper: 1.0,
    });
    // Default config bounds are +/-2.94, the tool's bounds are +/-1.
    let result = s.classify(&SprtConfig::default());
    assert_eq!(result.decision, Decision::H1);
}

#[test]
fn test_tool_llr_between_bounds_is_inconclusive() {
    let mut s = summary(50, 10, 48);
    s.llr = Some(LlrReport {
        value: 0.4,
        lower: -2.94,
        upper: 2.94,
    });
    let result = s.classify(&SprtConfig::default());
    assert_eq!(result.decision, Decision::Inconclusive);
    assert_eq!(result.games, 108);
    assert_eq!(result.score, 55.0);
}

#[test]
fn test_reconstruction_from_totals() {
    let cfg = SprtConfig::default();
    let crushing = summary(180, 10, 10);
    let result = crushing.classify(&cfg);
    assert_eq!(result.decision, Decision::H1);
    assert!(result.llr > cfg.upper_bound());

    let losing = summary(10, 10, 180);
    assert_eq!(losing.classify(&cfg).decision, Decision::H0);
}

#[test]
fn test_reconstruction_matches_incremental_variance() {
    use crate::outcome::GameResult;
    use crate::sprt::SprtState;

    let cfg = SprtConfig {
        min_games: 1_000,
        max_games: 1_000,
        ..SprtConfig::default()
    };
    let mut state = SprtState::new(cfg);
    for _ in 0..30 {
        state.push_result(GameResult::Win);
    }
    for _ in 0..20 {
        state.push_result(GameResult::Draw);
    }
    for _ in 0..25 {
        state.push_result(GameResult::Loss);
    }
    let batch = summary(30, 20, 25).reconstructed_llr(&cfg);
    assert!((batch - state.llr()).abs() < 1e-9, "{batch} vs {}", state.llr());
}

#[test]
fn test_empty_summary_is_inconclusive() {
    let result = summary(0, 0, 0).classify(&SprtConfig::default());
    assert_eq!(result.decision, Decision::Inconclusive);
    assert_eq!(result.llr, 0.0);
}
