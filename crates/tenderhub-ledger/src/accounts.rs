use async_trait::async_trait;
use dashmap::DashMap;

use tenderhub_types::{Accounts, Result, UserId, round_cents, validate_amount};

/// In-memory balance book. Unknown users have a zero balance.
#[derive(Debug, Default)]
pub struct AccountBook {
    balances: DashMap<UserId, f64>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add funds to a user's balance.
    pub fn deposit(&self, user: &UserId, amount: f64) -> Result<f64> {
        let amount = validate_amount(amount)?;
        let mut balance = self.balances.entry(user.clone()).or_insert(0.0);
        *balance = round_cents(*balance + amount);
        Ok(*balance)
    }

    pub fn balance_of(&self, user: &UserId) -> f64 {
        self.balances.get(user).map(|b| *b).unwrap_or(0.0)
    }
}

#[async_trait]
impl Accounts for AccountBook {
    async fn balance(&self, user: &UserId) -> Result<f64> {
        Ok(self.balance_of(user))
    }

    async fn post_transfer(&self, sender: &UserId, recipient: &UserId, amount: f64) -> Result<()> {
        let amount = validate_amount(amount)?;
        {
            let mut from = self.balances.entry(sender.clone()).or_insert(0.0);
            *from = round_cents(*from - amount);
        }
        let mut to = self.balances.entry(recipient.clone()).or_insert(0.0);
        *to = round_cents(*to + amount);
        Ok(())
    }
}
