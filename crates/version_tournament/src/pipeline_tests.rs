use super::*;

#[test]
fn test_pair_seed_layout() {
    assert_eq!(pair_seed(42, 0, 1), 43);
    assert_eq!(pair_seed(42, 2, 5), 2047);
    assert_ne!(pair_seed(7, 1, 2), pair_seed(7, 2, 1));
}

#[test]
fn test_cancel_flag_is_shared() {
    let flag = CancelFlag::new();
    let handle = flag.clone();
    assert!(!flag.is_cancelled());
    handle.cancel();
    assert!(flag.is_cancelled());
}
