use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::ids::UserId;

/// Warning states. `Pending` means the warned user has protested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningStatus {
    Active,
    Pending,
    Inactive,
    ActiveAndDenied,
}

/// Protest workflow events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningEvent {
    Protest,
    AcceptProtest,
    RejectProtest,
}

impl WarningStatus {
    pub fn transition(self, event: WarningEvent) -> Result<WarningStatus> {
        match (self, event) {
            (WarningStatus::Active | WarningStatus::ActiveAndDenied, WarningEvent::Protest) => {
                Ok(WarningStatus::Pending)
            }
            (WarningStatus::Pending, WarningEvent::AcceptProtest) => Ok(WarningStatus::Inactive),
            (WarningStatus::Pending, WarningEvent::RejectProtest) => {
                Ok(WarningStatus::ActiveAndDenied)
            }
            (from, event) => Err(MarketError::InvalidState(format!(
                "cannot apply {event:?} to a {from:?} warning"
            ))),
        }
    }

    /// Whether a warning in this state counts toward blacklist eligibility.
    pub fn counts_toward_blacklist(self) -> bool {
        matches!(self, WarningStatus::Active | WarningStatus::ActiveAndDenied)
    }
}

/// A reputation strike against a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    pub id: Uuid,
    pub warned_user: UserId,
    pub status: WarningStatus,
    /// Why the warning was issued.
    pub reason: Option<String>,
    /// The warned user's protest text, once protested.
    pub protest: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Warning {
    pub fn new(warned_user: UserId, reason: Option<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            warned_user,
            status: WarningStatus::Active,
            reason,
            protest: None,
            issued_at,
        }
    }

    pub fn apply_event(&mut self, event: WarningEvent) -> Result<()> {
        self.status = self.status.transition(event)?;
        Ok(())
    }
}
