use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use tenderhub_types::{Bid, BidRepository, MarketError, Result, UserId};

/// In-memory bid store with a per-demand index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBidRepository {
    entries: Arc<RwLock<Vec<Bid>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
    index_by_demand: Arc<DashMap<Uuid, Vec<usize>>>,
}

impl InMemoryBidRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BidRepository for InMemoryBidRepository {
    async fn insert(&self, bid: Bid) -> Result<()> {
        let mut entries = self.entries.write().await;
        if self.index_by_id.contains_key(&bid.id) {
            return Err(MarketError::AlreadyExists(format!("bid {}", bid.id)));
        }
        let idx = entries.len();
        self.index_by_id.insert(bid.id, idx);
        self.index_by_demand
            .entry(bid.demand_id)
            .or_default()
            .push(idx);
        entries.push(bid);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bid>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn for_demand(&self, demand_id: Uuid) -> Result<Vec<Bid>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_demand
            .get(&demand_id)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|idx| entries.get(*idx).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn by_developer(&self, developer: &UserId) -> Result<Vec<Bid>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|b| &b.developer_id == developer)
            .cloned()
            .collect())
    }

    async fn count_for_demand(&self, demand_id: Uuid) -> Result<usize> {
        Ok(self
            .index_by_demand
            .get(&demand_id)
            .map(|indices| indices.len())
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_indexes_by_demand_and_developer() {
        let repo = InMemoryBidRepository::new();
        let (d1, d2) = (Uuid::new_v4(), Uuid::new_v4());
        let now = Utc::now();

        repo.insert(Bid::new(d1, "alice".into(), 10.0, now).unwrap())
            .await
            .unwrap();
        repo.insert(Bid::new(d1, "bob".into(), 12.0, now).unwrap())
            .await
            .unwrap();
        repo.insert(Bid::new(d2, "alice".into(), 30.0, now).unwrap())
            .await
            .unwrap();

        assert_eq!(repo.for_demand(d1).await.unwrap().len(), 2);
        assert_eq!(repo.count_for_demand(d2).await.unwrap(), 1);
        assert_eq!(repo.count_for_demand(Uuid::new_v4()).await.unwrap(), 0);
        assert_eq!(repo.by_developer(&"alice".into()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_bid_rejected() {
        let repo = InMemoryBidRepository::new();
        let bid = Bid::new(Uuid::new_v4(), "alice".into(), 1.0, Utc::now()).unwrap();
        repo.insert(bid.clone()).await.unwrap();
        assert!(repo.insert(bid.clone()).await.is_err());
        assert_eq!(repo.get(bid.id).await.unwrap(), Some(bid));
    }
}
