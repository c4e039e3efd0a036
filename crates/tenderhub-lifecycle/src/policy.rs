use serde::{Deserialize, Serialize};

use tenderhub_types::UserId;

/// Fees, ratios and windows applied by the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecyclePolicy {
    /// Account that collects bidding-expiry fees and signs system notifications.
    pub system_account: UserId,
    /// Charged to the client when bidding closes with no bids.
    pub expiry_fee: f64,
    /// Added to the agreed amount when a developer misses the submission deadline.
    pub overdue_penalty: f64,
    /// Share of the agreed amount paid to the developer on assignment.
    pub advance_ratio: f64,
    /// Deadline notices fire once the deadline is this many whole days away.
    pub notice_window_days: i64,
    /// Only a developer who bid on the demand can be chosen.
    pub require_bid_for_assignment: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            system_account: UserId::from("superuser0"),
            expiry_fee: 10.0,
            overdue_penalty: 10.0,
            advance_ratio: 0.5,
            notice_window_days: 1,
            require_bid_for_assignment: true,
        }
    }
}
