use thiserror::Error;
use uuid::Uuid;

use crate::demand::{DemandEvent, DemandStatus};

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("State transition error: cannot transition demand from {from:?} via {event:?}")]
    InvalidStateTransition {
        from: DemandStatus,
        event: DemandEvent,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Demand {0} is not open for bidding")]
    DemandNotOpen(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Not eligible: {0}")]
    NotEligible(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl MarketError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for every variant that means "the entity was not in a state that allows this".
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { .. } | Self::InvalidState(_) | Self::DemandNotOpen(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
