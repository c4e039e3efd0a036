use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::ids::UserId;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;

/// Feedback left on a completed demand. Unique per (demand, recipient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub demand_id: Uuid,
    pub recipient: UserId,
    pub rater: UserId,
    pub score: u8,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(
        demand_id: Uuid,
        recipient: UserId,
        rater: UserId,
        score: u8,
        message: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
            return Err(MarketError::NotEligible(format!(
                "score {score} outside {MIN_SCORE}..={MAX_SCORE}"
            )));
        }
        Ok(Self {
            demand_id,
            recipient,
            rater,
            score,
            message,
            created_at,
        })
    }

    /// Key under which at most one rating may exist.
    pub fn key(&self) -> (Uuid, UserId) {
        (self.demand_id, self.recipient.clone())
    }
}

/// Mean score of `ratings`, or `None` when there are none.
pub fn average_score<'a>(ratings: impl IntoIterator<Item = &'a Rating>) -> Option<f64> {
    let (sum, count) = ratings
        .into_iter()
        .fold((0u64, 0u64), |(s, c), r| (s + u64::from(r.score), c + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}
