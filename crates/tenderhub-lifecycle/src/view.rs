use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenderhub_types::Demand;

/// A demand together with its bidding summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandView {
    #[serde(flatten)]
    pub demand: Demand,
    pub lowest_bid: Option<f64>,
    pub bid_count: usize,
    pub bidding_deadline_passed: bool,
}

impl DemandView {
    pub fn new(demand: Demand, lowest_bid: Option<f64>, bid_count: usize, now: DateTime<Utc>) -> Self {
        let bidding_deadline_passed = demand.bidding_deadline < now;
        Self {
            demand,
            lowest_bid,
            bid_count,
            bidding_deadline_passed,
        }
    }
}
