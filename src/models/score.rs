//! Self-rated recall quality given by the learner at review time.
//! 5 = perfect recall, 1 = total failure. Values outside 1-5 never construct.
use crate::error::ScheduleError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Lowest score that still counts as a successful recall.
pub const PASSING_SCORE: u8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PerformanceScore(u8);

impl PerformanceScore {
    pub fn new(value: i64) -> Result<Self, ScheduleError> {
        if (MIN_SCORE as i64..=MAX_SCORE as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ScheduleError::InvalidScore(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_SCORE
    }

    /// Distance from a perfect score, the `(5 - q)` term of the ease formula.
    pub(crate) fn shortfall(self) -> f64 {
        f64::from(MAX_SCORE - self.0)
    }
}

impl TryFrom<i64> for PerformanceScore {
    type Error = ScheduleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PerformanceScore> for i64 {
    fn from(score: PerformanceScore) -> Self {
        i64::from(score.0)
    }
}

impl fmt::Display for PerformanceScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
