//! Elo / expected-score conversions

/// Expected score for a side that is `elo_gap` points stronger than its opponent.
///
/// `expected_score(0.0) == 0.5`; positive gaps approach 1.0.
pub fn expected_score(elo_gap: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf(-elo_gap / 400.0))
}

/// Inverse of [`expected_score`]: the Elo gap implied by a score rate.
///
/// Rates of exactly 0 or 1 have no finite gap and are clamped to +/- 1000.
pub fn elo_from_score(score_rate: f64) -> f64 {
    const CLAMP: f64 = 1000.0;
    if score_rate <= 0.0 {
        return -CLAMP;
    }
    if score_rate >= 1.0 {
        return CLAMP;
    }
    (-400.0 * (1.0 / score_rate - 1.0).log10()).clamp(-CLAMP, CLAMP)
}

#[cfg(test)]
#[path = "elo_tests.rs"]
mod elo_tests;
