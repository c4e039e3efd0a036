use std::sync::Arc;

use tenderhub_bidding::{BidBook, InMemoryBidRepository};
use tenderhub_ledger::{AccountBook, InMemoryTransactionRepository, Ledger};
use tenderhub_lifecycle::{DemandEngine, InMemoryDemandRepository};
use tenderhub_reputation::{
    InMemoryBlacklistRepository, InMemoryRatingRepository, InMemoryWarningRepository,
    ReputationStore,
};
use tenderhub_sweeper::DeadlineSweeper;
use tenderhub_types::{Clock, DemandRepository, Inbox, KeyedLocks, SystemClock};

use crate::config::MarketConfig;

/// Services shared by every request handler and the sweep loop.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DemandEngine>,
    pub bids: Arc<BidBook>,
    pub ledger: Arc<Ledger>,
    pub reputation: Arc<ReputationStore>,
    pub accounts: Arc<AccountBook>,
    pub inbox: Arc<Inbox>,
    pub sweeper: DeadlineSweeper,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the in-memory stores together under one clock.
    pub fn new(config: &MarketConfig, clock: Arc<dyn Clock>) -> Self {
        let demand_locks = Arc::new(KeyedLocks::new());
        let demands: Arc<dyn DemandRepository> = Arc::new(InMemoryDemandRepository::new());
        let warnings = Arc::new(InMemoryWarningRepository::new());
        let accounts = Arc::new(AccountBook::new());
        let inbox = Arc::new(Inbox::new(clock.clone()));

        let ledger = Arc::new(
            Ledger::new(
                Arc::new(InMemoryTransactionRepository::new()),
                warnings.clone(),
                clock.clone(),
            )
            .with_accounts(accounts.clone()),
        );
        let reputation = Arc::new(
            ReputationStore::new(
                Arc::new(InMemoryRatingRepository::new()),
                warnings,
                Arc::new(InMemoryBlacklistRepository::new()),
                demands.clone(),
                clock.clone(),
            )
            .with_policy(config.policy.blacklist()),
        );
        let bids = Arc::new(BidBook::new(
            Arc::new(InMemoryBidRepository::new()),
            demands.clone(),
            inbox.clone(),
            clock.clone(),
            demand_locks.clone(),
        ));
        let engine = Arc::new(
            DemandEngine::new(
                demands,
                bids.clone(),
                ledger.clone(),
                reputation.clone(),
                inbox.clone(),
                clock.clone(),
                demand_locks,
            )
            .with_policy(config.policy.lifecycle.clone())
            .with_accounts(accounts.clone()),
        );
        let sweeper = DeadlineSweeper::new(engine.clone());

        Self {
            engine,
            bids,
            ledger,
            reputation,
            accounts,
            inbox,
            sweeper,
            clock,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&MarketConfig::default(), Arc::new(SystemClock))
    }
}
