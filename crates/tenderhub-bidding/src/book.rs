use std::sync::Arc;

use uuid::Uuid;

use tenderhub_types::{
    Bid, BidRepository, Clock, DemandRepository, DemandStatus, KeyedLocks, MarketError, Notifier,
    Result, UserId, lowest_first,
};

/// Per-demand bid collection.
///
/// Placement runs under the demand's lock, the same lock the lifecycle engine
/// takes, so a bid can never land on a demand that has just left Open.
pub struct BidBook {
    bids: Arc<dyn BidRepository>,
    demands: Arc<dyn DemandRepository>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    demand_locks: Arc<KeyedLocks>,
}

impl BidBook {
    pub fn new(
        bids: Arc<dyn BidRepository>,
        demands: Arc<dyn DemandRepository>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        demand_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            bids,
            demands,
            notifier,
            clock,
            demand_locks,
        }
    }

    /// Place a bid on an Open demand and tell the demand's client about it.
    pub async fn place_bid(&self, demand_id: Uuid, developer: &UserId, amount: f64) -> Result<Bid> {
        let (bid, client, title) = {
            let _guard = self.demand_locks.acquire(demand_id).await;
            let demand = self
                .demands
                .get(demand_id)
                .await?
                .ok_or_else(|| MarketError::not_found("demand", demand_id))?;
            if demand.status != DemandStatus::Open {
                return Err(MarketError::DemandNotOpen(demand_id));
            }

            let bid = Bid::new(demand_id, developer.clone(), amount, self.clock.now())?;
            self.bids.insert(bid.clone()).await?;
            (bid, demand.client_id, demand.title)
        };

        tracing::info!(
            demand_id = %demand_id,
            bid_id = %bid.id,
            %developer,
            amount = bid.amount,
            "bid placed"
        );

        let message = format!(
            "{developer} made a bid of ${:.2} on your {title} demand",
            bid.amount
        );
        if let Err(e) = self.notifier.notify(&client, developer, &message).await {
            tracing::warn!(demand_id = %demand_id, error = %e, "bid notification failed");
        }
        Ok(bid)
    }

    /// Bids on a demand, lowest amount first, earliest first among equal amounts.
    pub async fn bids_for(&self, demand_id: Uuid) -> Result<Vec<Bid>> {
        let mut bids = self.bids.for_demand(demand_id).await?;
        bids.sort_by(lowest_first);
        Ok(bids)
    }

    pub async fn lowest_bid(&self, demand_id: Uuid) -> Result<Option<Bid>> {
        Ok(self.bids_for(demand_id).await?.into_iter().next())
    }

    /// A developer's bids, most recent first.
    pub async fn bids_by_developer(&self, developer: &UserId) -> Result<Vec<Bid>> {
        let mut bids = self.bids.by_developer(developer).await?;
        bids.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(bids)
    }

    pub async fn bid_count(&self, demand_id: Uuid) -> Result<usize> {
        self.bids.count_for_demand(demand_id).await
    }

    /// Whether `developer` has any bid on the demand.
    pub async fn has_bid(&self, demand_id: Uuid, developer: &UserId) -> Result<bool> {
        Ok(self
            .bids
            .for_demand(demand_id)
            .await?
            .iter()
            .any(|b| &b.developer_id == developer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryBidRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use proptest::prelude::*;
    use std::sync::Mutex;
    use tenderhub_types::{Demand, ManualClock};

    struct FakeDemands {
        demands: Mutex<Vec<Demand>>,
    }

    #[async_trait]
    impl DemandRepository for FakeDemands {
        async fn insert(&self, demand: Demand) -> Result<()> {
            self.demands.lock().unwrap().push(demand);
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<Demand>> {
            Ok(self
                .demands
                .lock()
                .unwrap()
                .iter()
                .find(|d| d.id == id)
                .cloned())
        }

        async fn put(&self, demand: Demand) -> Result<()> {
            let mut demands = self.demands.lock().unwrap();
            if let Some(slot) = demands.iter_mut().find(|d| d.id == demand.id) {
                *slot = demand;
            }
            Ok(())
        }

        async fn scan(&self) -> Result<Vec<Demand>> {
            Ok(self.demands.lock().unwrap().clone())
        }
    }

    /// Records every message it is asked to deliver.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(UserId, UserId, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, recipient: &UserId, sender: &UserId, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((recipient.clone(), sender.clone(), message.to_string()));
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _: &UserId, _: &UserId, _: &str) -> Result<()> {
            Err(MarketError::Notification("inbox offline".into()))
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct Fixture {
        book: BidBook,
        demands: Arc<FakeDemands>,
        clock: Arc<ManualClock>,
        notifier: Arc<RecordingNotifier>,
    }

    fn fixture() -> Fixture {
        let demands = Arc::new(FakeDemands {
            demands: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(t0()));
        let notifier = Arc::new(RecordingNotifier::default());
        let book = BidBook::new(
            Arc::new(InMemoryBidRepository::new()),
            demands.clone(),
            notifier.clone(),
            clock.clone(),
            Arc::new(KeyedLocks::new()),
        );
        Fixture {
            book,
            demands,
            clock,
            notifier,
        }
    }

    async fn open_demand(demands: &FakeDemands) -> Demand {
        let demand = Demand::new(
            "client".into(),
            "Website",
            "a landing page",
            t0() + Duration::days(3),
            t0() + Duration::days(10),
            t0(),
        );
        demands.insert(demand.clone()).await.unwrap();
        demand
    }

    #[tokio::test]
    async fn test_place_bid_notifies_client() {
        let fx = fixture();
        let demand = open_demand(&fx.demands).await;

        let bid = fx
            .book
            .place_bid(demand.id, &"dev".into(), 99.999)
            .await
            .unwrap();
        assert_eq!(bid.amount, 100.0);

        let sent = fx.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, UserId::from("client"));
        assert_eq!(sent[0].1, UserId::from("dev"));
        assert_eq!(sent[0].2, "dev made a bid of $100.00 on your Website demand");
    }

    #[tokio::test]
    async fn test_bid_rejected_once_demand_leaves_open() {
        let fx = fixture();
        let mut demand = open_demand(&fx.demands).await;
        demand.assign("dev".into(), 50.0).unwrap();
        fx.demands.put(demand.clone()).await.unwrap();

        let result = fx.book.place_bid(demand.id, &"late".into(), 40.0).await;
        assert!(matches!(result, Err(MarketError::DemandNotOpen(id)) if id == demand.id));
        assert_eq!(fx.book.bid_count(demand.id).await.unwrap(), 0);
        assert!(fx.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_negative_bid_rejected() {
        let fx = fixture();
        let demand = open_demand(&fx.demands).await;
        let result = fx.book.place_bid(demand.id, &"dev".into(), -5.0).await;
        assert!(matches!(result, Err(MarketError::InvalidAmount(_))));
        assert!(fx.book.lowest_bid(demand.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bid_on_unknown_demand() {
        let fx = fixture();
        let result = fx.book.place_bid(Uuid::new_v4(), &"dev".into(), 5.0).await;
        assert!(matches!(result, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_bid() {
        let demands = Arc::new(FakeDemands {
            demands: Mutex::new(Vec::new()),
        });
        let book = BidBook::new(
            Arc::new(InMemoryBidRepository::new()),
            demands.clone(),
            Arc::new(FailingNotifier),
            Arc::new(ManualClock::new(t0())),
            Arc::new(KeyedLocks::new()),
        );
        let demand = open_demand(&demands).await;

        book.place_bid(demand.id, &"dev".into(), 10.0).await.unwrap();
        assert_eq!(book.bid_count(demand.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lowest_bid_prefers_earliest_on_tie() {
        let fx = fixture();
        let demand = open_demand(&fx.demands).await;

        fx.book.place_bid(demand.id, &"a".into(), 80.0).await.unwrap();
        fx.clock.advance(Duration::minutes(5));
        fx.book.place_bid(demand.id, &"b".into(), 60.0).await.unwrap();
        fx.clock.advance(Duration::minutes(5));
        fx.book.place_bid(demand.id, &"c".into(), 60.0).await.unwrap();

        let lowest = fx.book.lowest_bid(demand.id).await.unwrap().unwrap();
        assert_eq!(lowest.developer_id, UserId::from("b"));

        let order: Vec<_> = fx
            .book
            .bids_for(demand.id)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.developer_id.0)
            .collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert!(fx.book.has_bid(demand.id, &"c".into()).await.unwrap());
        assert!(!fx.book.has_bid(demand.id, &"z".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_bids_by_developer_newest_first() {
        let fx = fixture();
        let first = open_demand(&fx.demands).await;
        let second = open_demand(&fx.demands).await;

        fx.book.place_bid(first.id, &"dev".into(), 10.0).await.unwrap();
        fx.clock.advance(Duration::hours(1));
        fx.book.place_bid(second.id, &"dev".into(), 20.0).await.unwrap();

        let bids = fx.book.bids_by_developer(&"dev".into()).await.unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].demand_id, second.id);
        assert_eq!(bids[1].demand_id, first.id);
    }

    proptest! {
        #[test]
        fn prop_lowest_bid_is_minimum(amounts in proptest::collection::vec(0u32..10_000, 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let fx = fixture();
                let demand = open_demand(&fx.demands).await;
                for (i, cents) in amounts.iter().enumerate() {
                    fx.clock.advance(Duration::seconds(1));
                    fx.book
                        .place_bid(demand.id, &UserId::new(format!("dev{i}")), f64::from(*cents) / 100.0)
                        .await
                        .unwrap();
                }

                let lowest = fx.book.lowest_bid(demand.id).await.unwrap().unwrap();
                let min = amounts.iter().copied().min().unwrap();
                let first_min = amounts.iter().position(|a| *a == min).unwrap();
                prop_assert_eq!(lowest.amount, f64::from(min) / 100.0);
                prop_assert_eq!(lowest.developer_id, UserId::new(format!("dev{first_min}")));
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
