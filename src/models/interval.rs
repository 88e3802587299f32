//! Interval policy: Ebbinghaus stage ladder.
//!
//! - Scores below 3 send the item back to a sub-day retry, whatever its stage
//! - A pass from a sub-day stage lands on the first rung (1 day)
//! - A pass on a rung climbs to the next rung: 1 → 3 → 7 → 14 → 30 days
//! - Past the last rung the interval keeps growing by 30 days per pass

use super::{IntervalStage, PerformanceScore};
use serde::{Deserialize, Serialize};

pub const STAGE_LADDER: [u32; 5] = [1, 3, 7, 14, 30];

/// Days added per pass once an item is beyond the last rung.
pub const MASTERED_INCREMENT_DAYS: u32 = 30;

/// Which sub-day stage a failed review falls back to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubDayMode {
    /// Retry 20 minutes after the review.
    #[default]
    Immediate,
    /// Retry at the end of the review's calendar day.
    SameDay,
}

impl SubDayMode {
    pub fn reset_stage(self) -> IntervalStage {
        match self {
            Self::Immediate => IntervalStage::ImmediateRetry,
            Self::SameDay => IntervalStage::SameDayRetry,
        }
    }
}

/// Computes the stage granted by a review scored `score` at `current`.
pub fn next_interval_stage(
    current: IntervalStage,
    score: PerformanceScore,
    sub_day: SubDayMode,
) -> IntervalStage {
    if !score.is_passing() {
        return sub_day.reset_stage();
    }

    let days = match current {
        IntervalStage::ImmediateRetry | IntervalStage::SameDayRetry => STAGE_LADDER[0],
        IntervalStage::Days(days) => next_rung(days),
    };
    IntervalStage::Days(days)
}

/// Off-ladder stages (including 0) snap up to the first rung at or above
/// them before advancing, so `Days(0)` becomes 3, not 1.
/// Growth past the last rung stops at `u32::MAX` days.
fn next_rung(days: u32) -> u32 {
    match STAGE_LADDER.iter().position(|&rung| rung >= days) {
        Some(pos) if pos + 1 < STAGE_LADDER.len() => STAGE_LADDER[pos + 1],
        Some(pos) => STAGE_LADDER[pos] + MASTERED_INCREMENT_DAYS,
        None => match days.checked_add(MASTERED_INCREMENT_DAYS) {
            Some(next) => next,
            None => u32::MAX,
        },
    }
}
