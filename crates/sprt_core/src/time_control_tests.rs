use super::*;

#[test]
fn test_parse_increment_clock() {
    let tc: TimeControl = "10+0.1".parse().unwrap();
    assert_eq!(
        tc,
        TimeControl::Clock {
            moves: None,
            base: Duration::from_secs(10),
            increment: Duration::from_millis(100),
        }
    );
    assert_eq!(tc.to_string(), "10+0.1");
    assert_eq!(tc.tool_arg(), "tc=10+0.1");
}

#[test]
fn test_parse_repeating_clock() {
    let tc: TimeControl = "40/60+0.6".parse().unwrap();
    match tc {
        TimeControl::Clock { moves, base, .. } => {
            assert_eq!(moves, Some(40));
            assert_eq!(base, Duration::from_secs(60));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(tc.to_string(), "40/60+0.6");
}

#[test]
fn test_parse_move_time() {
    let tc: TimeControl = "st=0.25".parse().unwrap();
    assert_eq!(tc, TimeControl::MoveTime(Duration::from_millis(250)));
    assert_eq!(tc.tool_arg(), "st=0.250");
}

#[test]
fn test_move_time_ms_never_zero() {
    assert_eq!(
        TimeControl::move_time_ms(0),
        TimeControl::MoveTime(Duration::from_millis(1))
    );
}

#[test]
fn test_parse_errors() {
    assert_eq!("".parse::<TimeControl>(), Err(TimeControlError::Empty));
    assert!(matches!(
        "ten+1".parse::<TimeControl>(),
        Err(TimeControlError::InvalidNumber { .. })
    ));
    assert!(matches!(
        "0+0".parse::<TimeControl>(),
        Err(TimeControlError::ZeroTime(_))
    ));
    assert!(matches!(
        "st=0".parse::<TimeControl>(),
        Err(TimeControlError::ZeroTime(_))
    ));
}

#[test]
fn test_move_allowance() {
    let st = TimeControl::move_time_ms(100);
    assert_eq!(st.move_allowance(Duration::from_secs(5)), Duration::from_millis(100));

    let clock = TimeControl::clock(10.0, 0.1);
    assert_eq!(
        clock.move_allowance(Duration::from_secs(2)),
        Duration::from_secs(2)
    );
}

#[test]
fn test_session_timeout_grows_with_games() {
    let tc = TimeControl::default();
    let small = tc.session_timeout(10, 1);
    let large = tc.session_timeout(100, 1);
    assert!(large > small);
    // More concurrency means fewer sequential rounds.
    assert!(tc.session_timeout(100, 4) < large);
    assert!(small > Duration::from_secs(60));
}

#[test]
fn test_estimated_duration_counts_both_sides() {
    let tc = TimeControl::clock(10.0, 0.0);
    assert_eq!(tc.estimated_game_duration(160), Duration::from_secs(20));
    let st = TimeControl::move_time_ms(100);
    assert_eq!(st.estimated_game_duration(10), Duration::from_secs(1));
}

#[test]
fn test_serde_as_string() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        tc: TimeControl,
    }
    let w: Wrapper = serde_json::from_str(r#"{"tc":"5+0.05"}"#).unwrap();
    assert_eq!(w.tc, TimeControl::clock(5.0, 0.05));
    assert_eq!(serde_json::to_string(&w).unwrap(), r#"{"tc":"5+0.05"}"#);
    assert!(serde_json::from_str::<Wrapper>(r#"{"tc":"nope"}"#).is_err());
}
