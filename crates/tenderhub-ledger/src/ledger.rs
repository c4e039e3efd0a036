use std::sync::Arc;

use uuid::Uuid;

use tenderhub_types::{
    Accounts, Clock, KeyedLocks, MarketError, Result, Transaction, TransactionRepository,
    TransactionStatus, UserId, Warning, WarningRepository,
};

/// Append-only record of money movements and their approval state.
pub struct Ledger {
    transactions: Arc<dyn TransactionRepository>,
    warnings: Arc<dyn WarningRepository>,
    accounts: Option<Arc<dyn Accounts>>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl Ledger {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        warnings: Arc<dyn WarningRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transactions,
            warnings,
            accounts: None,
            clock,
            locks: KeyedLocks::new(),
        }
    }

    /// Post approved transfers to an account book.
    pub fn with_accounts(mut self, accounts: Arc<dyn Accounts>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Build a Pending transaction without storing it.
    pub fn prepare(
        &self,
        recipient: &UserId,
        sender: &UserId,
        amount: f64,
        reason: Option<String>,
    ) -> Result<Transaction> {
        Transaction::new(
            recipient.clone(),
            sender.clone(),
            amount,
            reason,
            self.clock.now(),
        )
    }

    /// Store a prepared transaction.
    pub async fn append(&self, transaction: Transaction) -> Result<Uuid> {
        if transaction.status != TransactionStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "transaction {} must be recorded as Pending",
                transaction.id
            )));
        }
        let id = transaction.id;
        let (recipient, sender, amount) = (
            transaction.recipient.clone(),
            transaction.sender.clone(),
            transaction.amount,
        );
        self.transactions.insert(transaction).await?;
        tracing::info!(
            transaction_id = %id,
            %recipient,
            %sender,
            amount,
            "transaction recorded"
        );
        Ok(id)
    }

    /// Record a Pending transfer of `amount` from `sender` to `recipient`.
    /// No balance check is made here.
    pub async fn record(
        &self,
        recipient: &UserId,
        sender: &UserId,
        amount: f64,
        reason: Option<String>,
    ) -> Result<Uuid> {
        let transaction = self.prepare(recipient, sender, amount, reason)?;
        self.append(transaction).await
    }

    /// Pending -> Approved. The transfer is final once this returns.
    pub async fn approve(&self, id: Uuid) -> Result<Transaction> {
        let _guard = self.locks.acquire(id).await;
        let mut transaction = self.get(id).await?;
        transaction.approve()?;

        if let Some(accounts) = &self.accounts {
            accounts
                .post_transfer(&transaction.sender, &transaction.recipient, transaction.amount)
                .await?;
        }
        self.transactions.put(transaction.clone()).await?;

        tracing::info!(transaction_id = %id, amount = transaction.amount, "transaction approved");
        Ok(transaction)
    }

    /// Pending -> Denied, issuing one Active warning against the sender.
    pub async fn deny(&self, id: Uuid) -> Result<(Transaction, Warning)> {
        let _guard = self.locks.acquire(id).await;
        let mut transaction = self.get(id).await?;
        transaction.deny()?;

        let warning = Warning::new(
            transaction.sender.clone(),
            Some(format!("transaction {id} was denied")),
            self.clock.now(),
        );
        self.transactions.put(transaction.clone()).await?;
        self.warnings.insert(warning.clone()).await?;

        tracing::info!(
            transaction_id = %id,
            warned_user = %transaction.sender,
            warning_id = %warning.id,
            "transaction denied"
        );
        Ok((transaction, warning))
    }

    /// Take back a Pending transaction whose surrounding transition failed to commit.
    pub async fn retract(&self, id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(id).await;
        let transaction = self.get(id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "transaction {id} is {:?} and cannot be retracted",
                transaction.status
            )));
        }
        self.transactions.remove(id).await?;
        tracing::warn!(transaction_id = %id, amount = transaction.amount, "transaction retracted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or_else(|| MarketError::not_found("transaction", id))
    }

    pub async fn list_pending(&self) -> Result<Vec<Transaction>> {
        self.filter(|t| t.status == TransactionStatus::Pending)
            .await
    }

    pub async fn list_by_recipient(&self, user: &UserId) -> Result<Vec<Transaction>> {
        self.filter(|t| &t.recipient == user).await
    }

    pub async fn list_by_sender(&self, user: &UserId) -> Result<Vec<Transaction>> {
        self.filter(|t| &t.sender == user).await
    }

    pub async fn all(&self) -> Result<Vec<Transaction>> {
        self.transactions.scan().await
    }

    async fn filter(&self, keep: impl Fn(&Transaction) -> bool) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .scan()
            .await?
            .into_iter()
            .filter(|t| keep(t))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountBook, InMemoryTransactionRepository};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tenderhub_types::{SystemClock, WarningStatus};

    /// A trivial warning store for testing.
    struct FakeWarnings {
        warnings: Mutex<Vec<Warning>>,
    }

    impl FakeWarnings {
        fn new() -> Self {
            Self {
                warnings: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WarningRepository for FakeWarnings {
        async fn insert(&self, warning: Warning) -> Result<()> {
            self.warnings.lock().unwrap().push(warning);
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<Warning>> {
            Ok(self
                .warnings
                .lock()
                .unwrap()
                .iter()
                .find(|w| w.id == id)
                .cloned())
        }

        async fn put(&self, warning: Warning) -> Result<()> {
            let mut warnings = self.warnings.lock().unwrap();
            if let Some(slot) = warnings.iter_mut().find(|w| w.id == warning.id) {
                *slot = warning;
            }
            Ok(())
        }

        async fn for_user(&self, user: &UserId) -> Result<Vec<Warning>> {
            Ok(self
                .warnings
                .lock()
                .unwrap()
                .iter()
                .filter(|w| &w.warned_user == user)
                .cloned()
                .collect())
        }

        async fn scan(&self) -> Result<Vec<Warning>> {
            Ok(self.warnings.lock().unwrap().clone())
        }
    }

    fn ledger() -> (Ledger, Arc<FakeWarnings>) {
        let warnings = Arc::new(FakeWarnings::new());
        let ledger = Ledger::new(
            Arc::new(InMemoryTransactionRepository::new()),
            warnings.clone(),
            Arc::new(SystemClock),
        );
        (ledger, warnings)
    }

    #[tokio::test]
    async fn test_record_is_pending() {
        let (ledger, _) = ledger();
        let id = ledger
            .record(&"dev".into(), &"client".into(), 50.0, Some("advance".into()))
            .await
            .unwrap();
        let tx = ledger.get(id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.reason.as_deref(), Some("advance"));
        assert_eq!(ledger.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let (ledger, _) = ledger();
        let result = ledger
            .record(&"dev".into(), &"client".into(), -1.0, None)
            .await;
        assert!(matches!(result, Err(MarketError::InvalidAmount(_))));
        assert!(ledger.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deny_issues_exactly_one_warning() {
        let (ledger, warnings) = ledger();
        let id = ledger
            .record(&"dev".into(), &"client".into(), 50.0, None)
            .await
            .unwrap();

        let (tx, warning) = ledger.deny(id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Denied);
        assert_eq!(warning.warned_user, UserId::from("client"));
        assert_eq!(warning.status, WarningStatus::Active);

        assert!(ledger.deny(id).await.unwrap_err().is_state_conflict());
        assert!(ledger.approve(id).await.is_err());
        assert_eq!(warnings.scan().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retract_only_pending() {
        let (ledger, _) = ledger();
        let pending = ledger
            .record(&"dev".into(), &"client".into(), 50.0, None)
            .await
            .unwrap();
        let settled = ledger
            .record(&"dev".into(), &"client".into(), 20.0, None)
            .await
            .unwrap();
        ledger.approve(settled).await.unwrap();

        ledger.retract(pending).await.unwrap();
        assert!(matches!(
            ledger.get(pending).await,
            Err(MarketError::NotFound { .. })
        ));
        assert!(ledger.retract(settled).await.unwrap_err().is_state_conflict());
        assert_eq!(ledger.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_approve_posts_transfer() {
        let warnings = Arc::new(FakeWarnings::new());
        let book = Arc::new(AccountBook::new());
        let ledger = Ledger::new(
            Arc::new(InMemoryTransactionRepository::new()),
            warnings.clone(),
            Arc::new(SystemClock),
        )
        .with_accounts(book.clone());

        let client = UserId::from("client");
        let dev = UserId::from("dev");
        book.deposit(&client, 100.0).unwrap();

        let id = ledger.record(&dev, &client, 40.0, None).await.unwrap();
        let tx = ledger.approve(id).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert_eq!(book.balance_of(&client), 60.0);
        assert_eq!(book.balance_of(&dev), 40.0);

        assert!(ledger.approve(id).await.is_err());
        assert_eq!(book.balance_of(&dev), 40.0);
        assert!(warnings.scan().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_resolution_happens_once() {
        let (ledger, warnings) = ledger();
        let ledger = Arc::new(ledger);
        let id = ledger
            .record(&"dev".into(), &"client".into(), 10.0, None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    ledger.deny(id).await.is_ok()
                } else {
                    ledger.approve(id).await.is_ok()
                }
            }));
        }
        let mut successes = 0;
        for h in handles {
            if h.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert!(warnings.scan().await.unwrap().len() <= 1);
    }

    #[tokio::test]
    async fn test_list_by_party() {
        let (ledger, _) = ledger();
        let a = UserId::from("a");
        let b = UserId::from("b");
        let c = UserId::from("c");
        ledger.record(&a, &b, 1.0, None).await.unwrap();
        ledger.record(&a, &c, 2.0, None).await.unwrap();
        ledger.record(&b, &a, 3.0, None).await.unwrap();

        assert_eq!(ledger.list_by_recipient(&a).await.unwrap().len(), 2);
        assert_eq!(ledger.list_by_sender(&a).await.unwrap().len(), 1);
        assert!(ledger.list_by_sender(&UserId::from("z")).await.unwrap().is_empty());
    }
}
