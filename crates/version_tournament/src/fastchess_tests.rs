use super::*;

const INTERIM_AND_FINAL: &str = "\
Started game 1 of 40 (a1b2c3d4 vs e5f6a7b8)
--------------------------------------------------
Results of a1b2c3d4 vs e5f6a7b8 (10+0.1, NULL, NULL, openings.epd):
Elo: 0.00 +/- 0.00, nElo: 0.00 +/- 0.00
Games: 10, Wins: 3, Losses: 3, Draws: 4, Points: 5.0 (50.00 %)
LLR: 0.01 (0.3%) (-2.94, 2.94) [0.00, 5.00]
--------------------------------------------------
Results of a1b2c3d4 vs e5f6a7b8 (10+0.1, NULL, NULL, openings.epd):
Elo: 35.04 +/- 60.2, nElo: 50.1 +/- 85.0
Games: 40, Wins: 18, Losses: 14, Draws: 8, Points: 22.0 (55.00 %)
LLR: 0.87 (29.6%) (-2.94, 2.94) [0.00, 5.00]
--------------------------------------------------
Finished match
";

#[test]
fn test_parse_takes_last_block() {
    let summary = parse_summary(INTERIM_AND_FINAL).unwrap();
    assert_eq!(summary.games, 40);
    assert_eq!(summary.wins, 18);
    assert_eq!(summary.losses, 14);
    assert_eq!(summary.draws, 8);
    assert_eq!(summary.points, 22.0);
    assert_eq!(
        summary.llr,
        Some(LlrReport {
            value: 0.87,
            lower: -2.94,
            upper: 2.94
        })
    );
    assert_eq!(summary.verdict, None);
}

#[test]
fn test_parse_literal_verdict() {
    let output = format!("{INTERIM_AND_FINAL}SPRT: H1 was accepted\n");
    assert_eq!(parse_summary(&output).unwrap().verdict, Some(Decision::H1));

    let output = format!("{INTERIM_AND_FINAL}SPRT: H0 was accepted\n");
    assert_eq!(parse_summary(&output).unwrap().verdict, Some(Decision::H0));
}

#[test]
fn test_parse_without_llr() {
    let output = "games: 2, wins: 2, losses: 0, draws: 0, points: 2\nFinished match\n";
    let summary = parse_summary(output).unwrap();
    assert_eq!(summary.games, 2);
    assert_eq!(summary.points, 2.0);
    assert!(summary.llr.is_none());
}

#[test]
fn test_parse_negative_llr() {
    let output = "Games: 8, Wins: 0, Losses: 6, Draws: 2, Points: 1.0\nLLR: -3.01 (-102.4%) (-2.94, 2.94) [0.00, 5.00]\n";
    let summary = parse_summary(output).unwrap();
    assert_eq!(summary.llr.map(|r| r.value), Some(-3.01));
}

#[test]
fn test_parse_without_results_is_unparseable() {
    let err = parse_summary("Warning: engine crashed\n").unwrap_err();
    match err {
        MatchToolError::Unparseable { reason, tail } => {
            assert!(reason.contains("results"));
            assert!(tail.contains("engine crashed"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_locate_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("fastchess");
    std::fs::write(&tool, "").unwrap();

    assert_eq!(locate_from(Some(&tool), None).unwrap(), tool);
    assert!(matches!(
        locate_from(Some(&dir.path().join("nope")), Some(tool.clone().into_os_string())),
        Err(ConfigError::MatchToolNotFound)
    ));
}

#[test]
fn test_locate_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("fc-custom");
    std::fs::write(&tool, "").unwrap();

    assert_eq!(
        locate_from(None, Some(tool.clone().into_os_string())).unwrap(),
        tool
    );
}

#[test]
fn test_configured_path_beats_environment() {
    let dir = tempfile::tempdir().unwrap();
    let configured = dir.path().join("fastchess");
    let from_env = dir.path().join("fc-env");
    std::fs::write(&configured, "").unwrap();
    std::fs::write(&from_env, "").unwrap();

    assert_eq!(
        locate_from(Some(&configured), Some(from_env.into_os_string())).unwrap(),
        configured
    );
}

#[test]
fn test_stale_environment_falls_through_to_path() {
    let stale = PathBuf::from("/nonexistent/fastchess");
    match locate_from(None, Some(stale.clone().into_os_string())) {
        Ok(found) => assert_ne!(found, stale),
        Err(e) => assert!(matches!(e, ConfigError::MatchToolNotFound)),
    }
}
