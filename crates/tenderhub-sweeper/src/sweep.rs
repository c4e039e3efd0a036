use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenderhub_lifecycle::DemandEngine;
use tenderhub_types::Result;

/// A demand whose deadline visit failed during a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub demand_id: Uuid,
    pub error: String,
}

/// Totals for one sweep pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub at: DateTime<Utc>,
    pub visited: usize,
    pub notices_sent: usize,
    pub bidding_expired: usize,
    pub overdue: usize,
    pub transactions: Vec<Uuid>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            visited: 0,
            notices_sent: 0,
            bidding_expired: 0,
            overdue: 0,
            transactions: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// True when the pass changed nothing.
    pub fn is_quiet(&self) -> bool {
        self.notices_sent == 0 && self.bidding_expired == 0 && self.overdue == 0
    }
}

/// Walks every non-terminal demand and applies the deadline rules due at `now`.
#[derive(Clone)]
pub struct DeadlineSweeper {
    engine: Arc<DemandEngine>,
}

impl DeadlineSweeper {
    pub fn new(engine: Arc<DemandEngine>) -> Self {
        Self { engine }
    }

    /// One pass. A failing demand is logged and recorded in the report; the
    /// pass carries on with the next one.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::new(now);

        for demand_id in self.engine.in_flight().await? {
            report.visited += 1;
            match self.engine.advance_deadlines(demand_id, now).await {
                Ok(outcome) => {
                    report.notices_sent += outcome.notices_sent;
                    report.bidding_expired += usize::from(outcome.bidding_expired);
                    report.overdue += usize::from(outcome.overdue);
                    report.transactions.extend(outcome.transactions);
                }
                Err(e) => {
                    tracing::warn!(demand_id = %demand_id, error = %e, "deadline visit failed");
                    report.failures.push(SweepFailure {
                        demand_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.is_quiet() && report.failures.is_empty() {
            tracing::debug!(visited = report.visited, "sweep found nothing due");
        } else {
            tracing::info!(
                visited = report.visited,
                notices = report.notices_sent,
                bidding_expired = report.bidding_expired,
                overdue = report.overdue,
                failures = report.failures.len(),
                "sweep complete"
            );
        }
        Ok(report)
    }
}
