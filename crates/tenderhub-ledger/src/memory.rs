use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use tenderhub_types::{MarketError, Result, Transaction, TransactionRepository};

/// In-memory transaction store (default).
#[derive(Debug, Clone)]
pub struct InMemoryTransactionRepository {
    entries: Arc<RwLock<Vec<Transaction>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
            index_by_id: Arc::new(DashMap::new()),
        }
    }
}

impl Default for InMemoryTransactionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn insert(&self, transaction: Transaction) -> Result<()> {
        let mut entries = self.entries.write().await;
        if self.index_by_id.contains_key(&transaction.id) {
            return Err(MarketError::AlreadyExists(format!(
                "transaction {}",
                transaction.id
            )));
        }
        self.index_by_id.insert(transaction.id, entries.len());
        entries.push(transaction);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Transaction>> {
        let entries = self.entries.read().await;
        Ok(self
            .index_by_id
            .get(&id)
            .and_then(|idx| entries.get(*idx).cloned()))
    }

    async fn put(&self, transaction: Transaction) -> Result<()> {
        let mut entries = self.entries.write().await;
        let idx = self
            .index_by_id
            .get(&transaction.id)
            .map(|idx| *idx)
            .ok_or_else(|| MarketError::not_found("transaction", transaction.id))?;
        entries[idx] = transaction;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let Some((_, idx)) = self.index_by_id.remove(&id) else {
            return Ok(false);
        };
        entries.remove(idx);
        for (pos, transaction) in entries.iter().enumerate().skip(idx) {
            self.index_by_id.insert(transaction.id, pos);
        }
        Ok(true)
    }

    async fn scan(&self) -> Result<Vec<Transaction>> {
        Ok(self.entries.read().await.clone())
    }
}
