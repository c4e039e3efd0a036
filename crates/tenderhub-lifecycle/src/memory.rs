use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use tenderhub_types::{Demand, DemandRepository, MarketError, Result};

/// In-memory demand store (default).
#[derive(Debug, Clone, Default)]
pub struct InMemoryDemandRepository {
    entries: Arc<RwLock<Vec<Demand>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
}

impl InMemoryDemandRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DemandRepository for InMemoryDemandRepository {
    async fn insert(&self, demand: Demand) -> Result<()> {
        let mut entries = self.entries.write().await;
        if self.index_by_id.contains_key(&demand.id) {
            return Err(MarketError::AlreadyExists(format!("demand {}", demand.id)));
        }
        self.index_by_id.insert(demand.id, entries.len());
        entries.push(demand);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Demand>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn put(&self, demand: Demand) -> Result<()> {
        let mut entries = self.entries.write().await;
        let idx = self
            .index_by_id
            .get(&demand.id)
            .map(|idx| *idx)
            .ok_or_else(|| MarketError::not_found("demand", demand.id))?;
        entries[idx] = demand;
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Demand>> {
        Ok(self.entries.read().await.clone())
    }
}
