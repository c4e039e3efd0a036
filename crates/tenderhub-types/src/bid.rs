use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::ids::UserId;
use crate::money::{round_cents, validate_amount};

/// A developer's offer on an Open demand. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub demand_id: Uuid,
    pub developer_id: UserId,
    pub amount: f64,
    pub submitted_at: DateTime<Utc>,
}

impl Bid {
    /// Build a bid, rejecting negative amounts and rounding to cents.
    pub fn new(
        demand_id: Uuid,
        developer_id: UserId,
        amount: f64,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self> {
        let amount = round_cents(validate_amount(amount)?);
        Ok(Self {
            id: Uuid::new_v4(),
            demand_id,
            developer_id,
            amount,
            submitted_at,
        })
    }
}

/// Lowest amount first; equal amounts go to the earliest submission.
pub fn lowest_first(a: &Bid, b: &Bid) -> Ordering {
    a.amount
        .partial_cmp(&b.amount)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.submitted_at.cmp(&b.submitted_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_bid_creation_rounds() {
        let bid = Bid::new(Uuid::new_v4(), UserId::from("dev"), 49.999, Utc::now()).unwrap();
        assert_eq!(bid.amount, 50.0);
    }

    #[test]
    fn test_negative_bid_rejected() {
        assert!(Bid::new(Uuid::new_v4(), UserId::from("dev"), -1.0, Utc::now()).is_err());
    }

    #[test]
    fn test_lowest_first_breaks_ties_by_time() {
        let demand = Uuid::new_v4();
        let now = Utc::now();
        let early = Bid::new(demand, UserId::from("a"), 10.0, now).unwrap();
        let late = Bid::new(demand, UserId::from("b"), 10.0, now + Duration::minutes(1)).unwrap();
        let cheap = Bid::new(demand, UserId::from("c"), 9.0, now + Duration::hours(1)).unwrap();

        let mut bids = vec![late.clone(), early.clone(), cheap.clone()];
        bids.sort_by(lowest_first);
        assert_eq!(bids[0].id, cheap.id);
        assert_eq!(bids[1].id, early.id);
        assert_eq!(bids[2].id, late.id);
    }
}
