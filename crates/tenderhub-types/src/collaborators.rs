use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::ids::UserId;

/// Time source for deadline comparisons.
///
/// Abstracted to allow testing with deterministic time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Delivers a message to a user's inbox. Fire-and-forget from the caller's side:
/// the engine logs failures and never rolls a transition back because of one.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &UserId, sender: &UserId, message: &str) -> Result<()>;
}

/// Account balance service.
#[async_trait]
pub trait Accounts: Send + Sync {
    async fn balance(&self, user: &UserId) -> Result<f64>;

    /// Post a settled transfer. Balances may go negative.
    async fn post_transfer(&self, sender: &UserId, recipient: &UserId, amount: f64) -> Result<()>;

    async fn can_afford(&self, user: &UserId, amount: f64) -> Result<bool> {
        Ok(self.balance(user).await? >= amount)
    }
}
