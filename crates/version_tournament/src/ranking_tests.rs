use super::*;
use proptest::prelude::*;

fn result(decision: Decision, wins: u32, draws: u32, losses: u32) -> SprtResult {
    SprtResult {
        decision,
        games: wins + draws + losses,
        score: wins as f64 + 0.5 * draws as f64,
        llr: 0.0,
        wins,
        draws,
        losses,
    }
}

fn board(ids: &[&str]) -> Scoreboard {
    Scoreboard::new(
        ids.iter()
            .map(|id| RankingEntry::new(*id, format!("{id} subject"), true))
            .collect(),
    )
}

#[test]
fn test_h1_credits_challenger() {
    let board = board(&["aaaaaaaaaa", "bbbbbbbbbb"]);
    board.record("aaaaaaaaaa", "bbbbbbbbbb", &result(Decision::H1, 12, 6, 2));

    let snap = board.snapshot();
    assert_eq!((snap[0].wins, snap[0].losses), (1, 0));
    assert_eq!((snap[1].wins, snap[1].losses), (0, 1));
    assert_eq!(snap[0].points, 15.0);
    assert_eq!(snap[1].points, 5.0);
    assert_eq!(snap[0].games, 20);
    assert_eq!(snap[1].games, 20);
    assert_eq!(snap[0].short, "aaaaaaaa");
}

#[test]
fn test_h0_credits_opponent_and_inconclusive_both() {
    let board = board(&["a", "b", "c"]);
    board.record("a", "b", &result(Decision::H0, 2, 6, 12));
    board.record("a", "c", &SprtResult::no_games());

    let snap = board.snapshot();
    assert_eq!((snap[0].wins, snap[0].losses, snap[0].inconclusive), (0, 1, 1));
    assert_eq!((snap[1].wins, snap[1].losses), (1, 0));
    assert_eq!(snap[2].inconclusive, 1);
    assert_eq!(snap[2].games, 0);
}

#[test]
fn test_unknown_version_is_ignored() {
    let board = board(&["a", "b"]);
    board.record("a", "zzz", &result(Decision::H1, 1, 0, 0));
    assert!(board.snapshot().iter().all(|e| e.wins == 0 && e.games == 0));
}

#[test]
fn test_order_net_then_score_rate() {
    let board = board(&["a", "b", "c"]);
    board.record("a", "b", &result(Decision::H0, 5, 5, 10));
    board.record("a", "c", &result(Decision::H0, 6, 6, 8));
    board.record("b", "c", &result(Decision::Inconclusive, 10, 0, 10));

    let ranked = board.ranked();
    // b and c both net +1; b scored 22.5 of 40, c 21 of 40
    let order: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(order, vec!["b", "c", "a"]);
    assert_eq!(board.best().unwrap().id, "b");
}

#[test]
fn test_ties_keep_resolution_order() {
    let board = board(&["first", "second", "third"]);
    let order: Vec<String> = board.ranked().into_iter().map(|e| e.id).collect();
    assert_eq!(order, vec!["first", "second", "third"]);
}

#[test]
fn test_unplayed_version_rates_even() {
    let entry = RankingEntry::new("abc", "abc", false);
    assert_eq!(entry.score_rate(), 0.5);
    assert_eq!(entry.net(), 0);
}

fn decision() -> impl Strategy<Value = Decision> {
    prop_oneof![
        Just(Decision::H1),
        Just(Decision::H0),
        Just(Decision::Inconclusive)
    ]
}

proptest! {
    #[test]
    fn prop_fold_order_does_not_matter(
        outcomes in prop::collection::vec((decision(), 0u32..20, 0u32..20, 0u32..20), 6),
        rotation in 0usize..6,
    ) {
        let ids = ["v0", "v1", "v2", "v3"];
        let pairs: Vec<(usize, usize)> = (0..4)
            .flat_map(|i| (i + 1..4).map(move |j| (i, j)))
            .collect();
        let folded: Vec<(usize, usize, SprtResult)> = pairs
            .iter()
            .zip(&outcomes)
            .map(|(&(i, j), &(d, w, dr, l))| (i, j, result(d, w, dr, l)))
            .collect();

        let forward = board(&ids);
        for (i, j, r) in &folded {
            forward.record(ids[*i], ids[*j], r);
        }

        let mut shuffled = folded.clone();
        shuffled.rotate_left(rotation);
        shuffled.reverse();
        let backward = board(&ids);
        for (i, j, r) in &shuffled {
            backward.record(ids[*i], ids[*j], r);
        }

        prop_assert_eq!(forward.ranked(), backward.ranked());
    }
}
