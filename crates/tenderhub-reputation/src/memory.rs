use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use tenderhub_types::{
    BlacklistEntry, BlacklistRepository, MarketError, Rating, RatingRepository, Result, UserId,
    Warning, WarningRepository,
};

/// In-memory rating store. The (demand, recipient) index enforces uniqueness.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRatingRepository {
    entries: Arc<RwLock<Vec<Rating>>>,
    index_by_key: Arc<DashMap<(Uuid, UserId), usize>>,
}

impl InMemoryRatingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn select(&self, keep: impl Fn(&Rating) -> bool) -> Vec<Rating> {
        let entries = self.entries.read().await;
        entries.iter().filter(|r| keep(r)).cloned().collect()
    }
}

#[async_trait]
impl RatingRepository for InMemoryRatingRepository {
    async fn insert(&self, rating: Rating) -> Result<()> {
        let mut entries = self.entries.write().await;
        let key = rating.key();
        if self.index_by_key.contains_key(&key) {
            return Err(MarketError::AlreadyExists(format!(
                "rating for {} on demand {}",
                key.1, key.0
            )));
        }
        self.index_by_key.insert(key, entries.len());
        entries.push(rating);
        Ok(())
    }

    async fn get(&self, demand_id: Uuid, recipient: &UserId) -> Result<Option<Rating>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_key
            .get(&(demand_id, recipient.clone()))
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn remove(&self, demand_id: Uuid, recipient: &UserId) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some((_, idx)) = self.index_by_key.remove(&(demand_id, recipient.clone())) else {
            return Ok(false);
        };
        entries.remove(idx);
        for (pos, rating) in entries.iter().enumerate().skip(idx) {
            self.index_by_key.insert(rating.key(), pos);
        }
        Ok(true)
    }

    async fn for_demand(&self, demand_id: Uuid) -> Result<Vec<Rating>> {
        Ok(self.select(|r| r.demand_id == demand_id).await)
    }

    async fn for_recipient(&self, recipient: &UserId) -> Result<Vec<Rating>> {
        Ok(self.select(|r| &r.recipient == recipient).await)
    }

    async fn by_rater(&self, rater: &UserId) -> Result<Vec<Rating>> {
        Ok(self.select(|r| &r.rater == rater).await)
    }
}

/// In-memory warning store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarningRepository {
    entries: Arc<RwLock<Vec<Warning>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
}

impl InMemoryWarningRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WarningRepository for InMemoryWarningRepository {
    async fn insert(&self, warning: Warning) -> Result<()> {
        let mut entries = self.entries.write().await;
        if self.index_by_id.contains_key(&warning.id) {
            return Err(MarketError::AlreadyExists(format!("warning {}", warning.id)));
        }
        self.index_by_id.insert(warning.id, entries.len());
        entries.push(warning);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Warning>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn put(&self, warning: Warning) -> Result<()> {
        let mut entries = self.entries.write().await;
        let idx = self
            .index_by_id
            .get(&warning.id)
            .map(|idx| *idx)
            .ok_or_else(|| MarketError::not_found("warning", warning.id))?;
        entries[idx] = warning;
        Ok(())
    }

    async fn for_user(&self, user: &UserId) -> Result<Vec<Warning>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|w| &w.warned_user == user)
            .cloned()
            .collect())
    }

    async fn scan(&self) -> Result<Vec<Warning>> {
        Ok(self.entries.read().await.clone())
    }
}

/// In-memory blacklist, one entry per user.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlacklistRepository {
    entries: Arc<DashMap<UserId, BlacklistEntry>>,
}

impl InMemoryBlacklistRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlacklistRepository for InMemoryBlacklistRepository {
    async fn put(&self, entry: BlacklistEntry) -> Result<()> {
        self.entries.insert(entry.user_id.clone(), entry);
        Ok(())
    }

    async fn get(&self, user: &UserId) -> Result<Option<BlacklistEntry>> {
        Ok(self.entries.get(user).map(|e| e.clone()))
    }
}
