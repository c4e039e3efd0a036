use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per entity id.
///
/// Every check-then-write on a demand, transaction or warning runs while holding
/// the guard for that id, so two racing writers serialize instead of both passing
/// the same guard.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. The lock is released when the guard drops.
    pub async fn acquire(&self, id: Uuid) -> KeyedGuard<'_> {
        let lock = Arc::clone(self.locks.entry(id).or_default().value());
        KeyedGuard {
            guard: Some(lock.lock_owned().await),
            locks: &self.locks,
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one id. On drop the id's entry is removed unless
/// another task is still holding or waiting on it.
pub struct KeyedGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    locks: &'a DashMap<Uuid, Arc<Mutex<()>>>,
    id: Uuid,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_id_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("second acquire should proceed after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(Uuid::new_v4()))
            .await
            .expect("different ids should not contend");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_ids_are_forgotten() {
        let locks = KeyedLocks::new();
        for _ in 0..10 {
            let _g = locks.acquire(Uuid::new_v4()).await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_contended() {
        let locks = Arc::new(KeyedLocks::new());
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the lock")
            .unwrap();
        assert!(locks.is_empty());
    }
}
