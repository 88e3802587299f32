//! One immutable record per review attempt, kept for analytics.
use super::{PerformanceScore, ReviewItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLogEntry {
    pub review_item_id: ReviewItemId,
    pub performance_score: PerformanceScore,
    pub timestamp: DateTime<Utc>,
}

impl SessionLogEntry {
    pub fn new(
        review_item_id: ReviewItemId,
        performance_score: PerformanceScore,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            review_item_id,
            performance_score,
            timestamp,
        }
    }
}
