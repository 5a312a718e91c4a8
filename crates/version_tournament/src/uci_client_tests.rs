use super::*;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

fn fake_engine(dir: &Path, on_go: &str) -> PathBuf {
    let path = dir.join("engine.sh");
    let script = format!(
        r#"#!/bin/sh
while read -r cmd; do
  case "$cmd" in
    uci) echo "id name fake"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*) {on_go} ;;
    quit) exit 0 ;;
  esac
done
"#
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_parse_info_score() {
    assert_eq!(
        parse_info_score("info depth 12 seldepth 18 score cp -34 nodes 1000 pv e2e4"),
        Some(Score::Centipawns(-34))
    );
    assert_eq!(
        parse_info_score("info depth 3 score mate -2 pv a1a2"),
        Some(Score::Mate(-2))
    );
    assert_eq!(parse_info_score("info depth 1 nodes 20"), None);
    assert_eq!(parse_info_score("bestmove e2e4"), None);
}

#[test]
fn test_parse_bestmove() {
    assert_eq!(
        parse_bestmove("bestmove e2e4 ponder e7e5", None),
        Some(EngineReply::Move("e2e4".to_string()))
    );
    assert_eq!(
        parse_bestmove("bestmove (none)", Some(Score::Mate(0))),
        Some(EngineReply::NoMove { mated: true })
    );
    assert_eq!(
        parse_bestmove("bestmove 0000", Some(Score::Centipawns(0))),
        Some(EngineReply::NoMove { mated: false })
    );
    assert_eq!(parse_bestmove("readyok", None), None);
}

#[test]
fn test_commands() {
    assert_eq!(
        position_command(crate::openings::STARTPOS, &[]),
        format!("position fen {}", crate::openings::STARTPOS)
    );
    assert_eq!(
        position_command("8/8/8/8/8/8/8/K6k w - - 0 1", &["a1a2".to_string(), "h1h2".to_string()]),
        "position fen 8/8/8/8/8/8/8/K6k w - - 0 1 moves a1a2 h1h2"
    );
    assert_eq!(
        go_command(&GoLimits::MoveTime(Duration::from_millis(250))),
        "go movetime 250"
    );
    assert_eq!(
        go_command(&GoLimits::Clock {
            wtime: Duration::from_secs(10),
            btime: Duration::from_millis(9500),
            winc: Duration::from_millis(100),
            binc: Duration::from_millis(100),
            movestogo: Some(40),
        }),
        "go wtime 10000 btime 9500 winc 100 binc 100 movestogo 40"
    );
}

#[test]
fn test_engine_plays_a_move() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_engine(dir.path(), r#"echo "info depth 1 score cp 20"; echo "bestmove e2e4""#);
    let mut engine = UciEngine::start(&binary, "fake", &[("Hash".into(), "16".into())], WAIT).unwrap();

    engine.new_game().unwrap();
    engine.set_position(crate::openings::STARTPOS, &[]).unwrap();
    let reply = engine
        .go(&GoLimits::MoveTime(Duration::from_millis(10)), WAIT)
        .unwrap();
    assert_eq!(reply, EngineReply::Move("e2e4".to_string()));
    assert_eq!(engine.name(), "fake");
}

#[test]
fn test_mated_engine_reports_no_move() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_engine(dir.path(), r#"echo "info depth 0 score mate 0"; echo "bestmove (none)""#);
    let mut engine = UciEngine::start(&binary, "fake", &[], WAIT).unwrap();

    let reply = engine
        .go(&GoLimits::MoveTime(Duration::from_millis(10)), WAIT)
        .unwrap();
    assert_eq!(reply, EngineReply::NoMove { mated: true });
}

#[test]
fn test_silent_engine_is_no_reply() {
    let dir = tempfile::tempdir().unwrap();
    let binary = fake_engine(dir.path(), ":");
    let mut engine = UciEngine::start(&binary, "fake", &[], WAIT).unwrap();

    let reply = engine
        .go(
            &GoLimits::MoveTime(Duration::from_millis(10)),
            Duration::from_millis(100),
        )
        .unwrap();
    assert_eq!(reply, EngineReply::NoReply);
}

#[test]
fn test_missing_binary_is_spawn_error() {
    let err = UciEngine::start(Path::new("/nonexistent/engine"), "ghost", &[], WAIT)
        .err()
        .unwrap();
    assert!(matches!(err, MatchToolError::Spawn { .. }));
}

#[test]
fn test_engine_without_uci_fails_handshake() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mute.sh");
    fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

    let err = UciEngine::start(&path, "mute", &[], WAIT).err().unwrap();
    assert!(matches!(err, MatchToolError::Engine { .. }));
}
