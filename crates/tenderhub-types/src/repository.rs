//! Storage capabilities, one per entity type.
//!
//! Services depend on these traits rather than on a concrete store. The
//! in-memory implementations live next to the service that owns each entity.

use async_trait::async_trait;
use uuid::Uuid;

use crate::bid::Bid;
use crate::blacklist::BlacklistEntry;
use crate::demand::Demand;
use crate::error::Result;
use crate::ids::UserId;
use crate::rating::Rating;
use crate::transaction::Transaction;
use crate::warning::Warning;

#[async_trait]
pub trait DemandRepository: Send + Sync {
    async fn insert(&self, demand: Demand) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Demand>>;

    /// Overwrite an existing demand.
    async fn put(&self, demand: Demand) -> Result<()>;

    /// All demands, in insertion order.
    async fn scan(&self) -> Result<Vec<Demand>>;
}

#[async_trait]
pub trait BidRepository: Send + Sync {
    async fn insert(&self, bid: Bid) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Bid>>;

    /// Bids on a demand, in insertion order.
    async fn for_demand(&self, demand_id: Uuid) -> Result<Vec<Bid>>;

    /// Bids by a developer, in insertion order.
    async fn by_developer(&self, developer: &UserId) -> Result<Vec<Bid>>;

    async fn count_for_demand(&self, demand_id: Uuid) -> Result<usize> {
        Ok(self.for_demand(demand_id).await?.len())
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn insert(&self, transaction: Transaction) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>>;

    async fn put(&self, transaction: Transaction) -> Result<()>;

    /// Delete a transaction. Returns false if it was not stored.
    async fn remove(&self, id: Uuid) -> Result<bool>;

    /// All transactions, in insertion order.
    async fn scan(&self) -> Result<Vec<Transaction>>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert a rating. Fails with `AlreadyExists` if (demand, recipient) is taken.
    async fn insert(&self, rating: Rating) -> Result<()>;

    async fn get(&self, demand_id: Uuid, recipient: &UserId) -> Result<Option<Rating>>;

    /// Delete the rating for (demand, recipient). Returns false if there was none.
    async fn remove(&self, demand_id: Uuid, recipient: &UserId) -> Result<bool>;

    async fn for_demand(&self, demand_id: Uuid) -> Result<Vec<Rating>>;

    async fn for_recipient(&self, recipient: &UserId) -> Result<Vec<Rating>>;

    async fn by_rater(&self, rater: &UserId) -> Result<Vec<Rating>>;
}

#[async_trait]
pub trait WarningRepository: Send + Sync {
    async fn insert(&self, warning: Warning) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Warning>>;

    async fn put(&self, warning: Warning) -> Result<()>;

    async fn for_user(&self, user: &UserId) -> Result<Vec<Warning>>;

    async fn scan(&self) -> Result<Vec<Warning>>;
}

#[async_trait]
pub trait BlacklistRepository: Send + Sync {
    /// Insert or replace the entry for `entry.user_id`.
    async fn put(&self, entry: BlacklistEntry) -> Result<()>;

    async fn get(&self, user: &UserId) -> Result<Option<BlacklistEntry>>;
}
