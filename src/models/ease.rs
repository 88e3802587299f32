//! Ease factor policy (SuperMemo 2 adjustment).
//!
//! EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)), never below 1.3.
//! A perfect score adds 0.1; every point below 5 costs quadratically more.

use super::PerformanceScore;

pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Calculates the ease factor after a review scored `score`.
pub fn next_ease_factor(current: f64, score: PerformanceScore) -> f64 {
    let q = score.shortfall();
    let new_ef = current + (0.1 - q * (0.08 + q * 0.02));

    // E-Factor should not fall below 1.3
    new_ef.max(MIN_EASE_FACTOR)
}
