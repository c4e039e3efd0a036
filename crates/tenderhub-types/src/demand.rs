use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::ids::UserId;

/// Demand lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemandStatus {
    Open,
    Assigned,
    Completed,
    BiddingExpired,
    Overdue,
}

/// Events that drive demand state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemandEvent {
    DeveloperChosen,
    CompletionSubmitted,
    BiddingDeadlinePassed,
    SubmissionDeadlinePassed,
}

impl DemandStatus {
    /// Attempt a state transition given an event.
    /// Returns the new state or an error if the transition is invalid.
    pub fn transition(self, event: DemandEvent) -> Result<DemandStatus> {
        match (self, event) {
            (DemandStatus::Open, DemandEvent::DeveloperChosen) => Ok(DemandStatus::Assigned),
            (DemandStatus::Open, DemandEvent::BiddingDeadlinePassed) => {
                Ok(DemandStatus::BiddingExpired)
            }

            (DemandStatus::Assigned, DemandEvent::CompletionSubmitted) => {
                Ok(DemandStatus::Completed)
            }
            (DemandStatus::Assigned, DemandEvent::SubmissionDeadlinePassed) => {
                Ok(DemandStatus::Overdue)
            }

            // Completed, BiddingExpired and Overdue are absorbing.
            (from, event) => Err(MarketError::InvalidStateTransition { from, event }),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DemandStatus::Completed | DemandStatus::BiddingExpired | DemandStatus::Overdue
        )
    }

}

/// True when `deadline` is at most `window_days` whole days away from `now`.
///
/// Whole days are truncated, so a one-day window fires anywhere from a few
/// minutes to just under 48 hours ahead, and always once the deadline is past.
pub fn within_notice_window(deadline: DateTime<Utc>, now: DateTime<Utc>, window_days: i64) -> bool {
    (deadline - now).num_days() <= window_days
}

/// A unit of requested work posted by a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    pub id: Uuid,
    pub client_id: UserId,
    pub title: String,
    pub tags: Vec<String>,
    pub specification: String,
    pub bidding_deadline: DateTime<Utc>,
    pub submission_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: DemandStatus,
    pub assigned_developer: Option<UserId>,
    pub agreed_amount: Option<f64>,
    pub bidding_deadline_notified: bool,
    pub submission_deadline_notified: bool,
    pub expired: bool,
}

impl Demand {
    pub fn new(
        client_id: UserId,
        title: impl Into<String>,
        specification: impl Into<String>,
        bidding_deadline: DateTime<Utc>,
        submission_deadline: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            title: title.into(),
            tags: Vec::new(),
            specification: specification.into(),
            bidding_deadline,
            submission_deadline,
            created_at,
            status: DemandStatus::Open,
            assigned_developer: None,
            agreed_amount: None,
            bidding_deadline_notified: false,
            submission_deadline_notified: false,
            expired: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Record the winning developer and the agreed amount.
    ///
    /// Fails unless the demand is Open; the developer and amount are written once.
    pub fn assign(&mut self, developer: UserId, amount: f64) -> Result<()> {
        let next = self.status.transition(DemandEvent::DeveloperChosen)?;
        if self.assigned_developer.is_some() {
            return Err(MarketError::InvalidState(format!(
                "demand {} already has a developer",
                self.id
            )));
        }
        self.status = next;
        self.assigned_developer = Some(developer);
        self.agreed_amount = Some(amount);
        Ok(())
    }

    /// Mark the demand completed on behalf of `developer`.
    pub fn complete(&mut self, developer: &UserId) -> Result<()> {
        if self.assigned_developer.as_ref() != Some(developer) {
            return Err(MarketError::Unauthorized(format!(
                "{developer} is not the assigned developer of demand {}",
                self.id
            )));
        }
        self.status = self.status.transition(DemandEvent::CompletionSubmitted)?;
        Ok(())
    }

    /// Move an unbid Open demand to BiddingExpired and raise the expired flag.
    pub fn expire_bidding(&mut self) -> Result<()> {
        self.status = self.status.transition(DemandEvent::BiddingDeadlinePassed)?;
        self.expired = true;
        Ok(())
    }

    /// Move an Assigned demand to Overdue and raise the expired flag.
    pub fn mark_overdue(&mut self) -> Result<()> {
        self.status = self
            .status
            .transition(DemandEvent::SubmissionDeadlinePassed)?;
        self.expired = true;
        Ok(())
    }

    /// Bidding-deadline notice is due: not terminal, inside the window, not yet sent.
    ///
    /// An early assignment does not cancel the client's reminder.
    pub fn bidding_notice_due(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        !self.status.is_terminal()
            && !self.bidding_deadline_notified
            && within_notice_window(self.bidding_deadline, now, window_days)
    }

    /// Submission-deadline notice is due: Assigned, inside the window, not yet sent.
    pub fn submission_notice_due(&self, now: DateTime<Utc>, window_days: i64) -> bool {
        self.status == DemandStatus::Assigned
            && !self.submission_deadline_notified
            && within_notice_window(self.submission_deadline, now, window_days)
    }

    /// Bidding expiry is due once the bidding deadline has passed with no bids.
    pub fn bidding_expiry_due(&self, now: DateTime<Utc>, bid_count: usize) -> bool {
        self.status == DemandStatus::Open
            && !self.expired
            && now > self.bidding_deadline
            && bid_count == 0
    }

    /// Overdue is due once the submission deadline has passed without completion.
    pub fn overdue_due(&self, now: DateTime<Utc>) -> bool {
        self.status == DemandStatus::Assigned && !self.expired && now > self.submission_deadline
    }

    /// Still accepting bids from a browsing point of view.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.bidding_deadline > now && self.status != DemandStatus::Completed
    }

    pub fn involves(&self, user: &UserId) -> bool {
        &self.client_id == user || self.assigned_developer.as_ref() == Some(user)
    }
}
