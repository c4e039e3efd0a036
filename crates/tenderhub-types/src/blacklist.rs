use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Exclusion record written by a reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub user_id: UserId,
    pub blacklisted_at: DateTime<Utc>,
    pub blacklisted_until: DateTime<Utc>,
}

impl BlacklistEntry {
    pub fn new(user_id: UserId, now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            user_id,
            blacklisted_at: now,
            blacklisted_until: now + duration,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.blacklisted_until
    }
}
