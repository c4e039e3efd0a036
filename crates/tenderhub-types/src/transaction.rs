use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::ids::UserId;
use crate::money::validate_amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Approved,
    Denied,
}

/// One money movement: `amount` is debited from `sender` and credited to `recipient`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub recipient: UserId,
    pub sender: UserId,
    pub amount: f64,
    pub status: TransactionStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        recipient: UserId,
        sender: UserId,
        amount: f64,
        reason: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            recipient,
            sender,
            amount: validate_amount(amount)?,
            status: TransactionStatus::Pending,
            reason,
            created_at,
        })
    }

    pub fn approve(&mut self) -> Result<()> {
        self.resolve(TransactionStatus::Approved)
    }

    pub fn deny(&mut self) -> Result<()> {
        self.resolve(TransactionStatus::Denied)
    }

    fn resolve(&mut self, to: TransactionStatus) -> Result<()> {
        if self.status != TransactionStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "transaction {} is {:?}, not Pending",
                self.id, self.status
            )));
        }
        self.status = to;
        Ok(())
    }
}
