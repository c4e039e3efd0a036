use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tenderhub_types::{
    BlacklistEntry, BlacklistRepository, Clock, Demand, DemandRepository, DemandStatus,
    KeyedLocks, MarketError, Rating, RatingRepository, Result, UserId, Warning, WarningEvent,
    WarningRepository, WarningStatus, average_score,
};

use crate::policy::BlacklistPolicy;

/// Ratings, warnings and blacklist entries, and the rules that tie them to demands.
pub struct ReputationStore {
    ratings: Arc<dyn RatingRepository>,
    warnings: Arc<dyn WarningRepository>,
    blacklist: Arc<dyn BlacklistRepository>,
    demands: Arc<dyn DemandRepository>,
    clock: Arc<dyn Clock>,
    policy: BlacklistPolicy,
    warning_locks: KeyedLocks,
}

impl ReputationStore {
    pub fn new(
        ratings: Arc<dyn RatingRepository>,
        warnings: Arc<dyn WarningRepository>,
        blacklist: Arc<dyn BlacklistRepository>,
        demands: Arc<dyn DemandRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ratings,
            warnings,
            blacklist,
            demands,
            clock,
            policy: BlacklistPolicy::default(),
            warning_locks: KeyedLocks::new(),
        }
    }

    pub fn with_policy(mut self, policy: BlacklistPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> BlacklistPolicy {
        self.policy
    }

    // --- ratings ---

    /// Rate the other party of a completed demand.
    ///
    /// The (recipient, rater) pair must be the demand's (client, developer) in
    /// either direction. A second rating for the same recipient fails with
    /// `AlreadyExists`.
    pub async fn rate(
        &self,
        demand_id: Uuid,
        recipient: &UserId,
        rater: &UserId,
        score: u8,
        message: Option<String>,
    ) -> Result<Rating> {
        let demand = self.demand(demand_id).await?;
        if demand.status != DemandStatus::Completed {
            return Err(MarketError::NotEligible(format!(
                "demand {demand_id} is {:?}, ratings open once it is Completed",
                demand.status
            )));
        }
        if !is_counterpart(&demand, recipient, rater) {
            return Err(MarketError::NotEligible(format!(
                "{rater} cannot rate {recipient} on demand {demand_id}"
            )));
        }

        let rating = Rating::new(
            demand_id,
            recipient.clone(),
            rater.clone(),
            score,
            message,
            self.clock.now(),
        )?;
        self.ratings.insert(rating.clone()).await?;

        tracing::info!(demand_id = %demand_id, %recipient, %rater, score, "rating recorded");
        Ok(rating)
    }

    /// Store a rating issued by the system itself, skipping the counterpart checks.
    pub async fn record_system_rating(&self, rating: Rating) -> Result<()> {
        let (demand_id, recipient, score) = (rating.demand_id, rating.recipient.clone(), rating.score);
        self.ratings.insert(rating).await?;
        tracing::info!(demand_id = %demand_id, %recipient, score, "system rating recorded");
        Ok(())
    }

    /// Remove a system rating whose surrounding transition failed to commit.
    pub async fn retract_system_rating(&self, demand_id: Uuid, recipient: &UserId) -> Result<()> {
        if self.ratings.remove(demand_id, recipient).await? {
            tracing::warn!(demand_id = %demand_id, %recipient, "system rating retracted");
        }
        Ok(())
    }

    /// Whether `rater` may still rate `recipient` on this demand.
    pub async fn can_rate(&self, demand_id: Uuid, recipient: &UserId, rater: &UserId) -> Result<bool> {
        let Some(demand) = self.demands.get(demand_id).await? else {
            return Ok(false);
        };
        if demand.status != DemandStatus::Completed || !is_counterpart(&demand, recipient, rater) {
            return Ok(false);
        }
        Ok(self.ratings.get(demand_id, recipient).await?.is_none())
    }

    /// Mean of every rating `user` has received; `None` when there are none.
    pub async fn average_rating(&self, user: &UserId) -> Result<Option<f64>> {
        let received = self.ratings.for_recipient(user).await?;
        Ok(average_score(&received))
    }

    /// Mean of every rating `user` has handed out.
    pub async fn average_given_rating(&self, user: &UserId) -> Result<Option<f64>> {
        let given = self.ratings.by_rater(user).await?;
        Ok(average_score(&given))
    }

    pub async fn ratings_for_demand(&self, demand_id: Uuid) -> Result<Vec<Rating>> {
        self.ratings.for_demand(demand_id).await
    }

    pub async fn ratings_for(&self, user: &UserId) -> Result<Vec<Rating>> {
        self.ratings.for_recipient(user).await
    }

    // --- warnings ---

    /// Issue a new Active warning against `user`.
    pub async fn issue_warning(&self, user: &UserId, reason: Option<String>) -> Result<Warning> {
        let warning = Warning::new(user.clone(), reason, self.clock.now());
        self.warnings.insert(warning.clone()).await?;
        tracing::info!(warning_id = %warning.id, warned_user = %user, "warning issued");
        Ok(warning)
    }

    pub async fn get_warning(&self, id: Uuid) -> Result<Warning> {
        self.warnings
            .get(id)
            .await?
            .ok_or_else(|| MarketError::not_found("warning", id))
    }

    pub async fn warnings_for(&self, user: &UserId) -> Result<Vec<Warning>> {
        self.warnings.for_user(user).await
    }

    /// Warnings awaiting a reviewer decision.
    pub async fn pending_protests(&self) -> Result<Vec<Warning>> {
        Ok(self
            .warnings
            .scan()
            .await?
            .into_iter()
            .filter(|w| w.status == WarningStatus::Pending)
            .collect())
    }

    /// Number of warnings currently counting toward a blacklist.
    pub async fn warning_count(&self, user: &UserId) -> Result<usize> {
        Ok(self
            .warnings
            .for_user(user)
            .await?
            .iter()
            .filter(|w| w.status.counts_toward_blacklist())
            .count())
    }

    /// Evaluated against the current warning statuses, not the historical maximum.
    pub async fn blacklist_eligible(&self, user: &UserId) -> Result<bool> {
        Ok(self.policy.is_eligible(self.warning_count(user).await?))
    }

    pub async fn protest(&self, warning_id: Uuid, reason: impl Into<String>) -> Result<Warning> {
        let reason = reason.into();
        self.apply_warning_event(warning_id, WarningEvent::Protest, move |w| {
            w.protest = Some(reason);
        })
        .await
    }

    pub async fn accept_protest(&self, warning_id: Uuid) -> Result<Warning> {
        self.apply_warning_event(warning_id, WarningEvent::AcceptProtest, |_| {})
            .await
    }

    pub async fn reject_protest(&self, warning_id: Uuid) -> Result<Warning> {
        self.apply_warning_event(warning_id, WarningEvent::RejectProtest, |_| {})
            .await
    }

    async fn apply_warning_event(
        &self,
        warning_id: Uuid,
        event: WarningEvent,
        amend: impl FnOnce(&mut Warning),
    ) -> Result<Warning> {
        let _guard = self.warning_locks.acquire(warning_id).await;
        let mut warning = self.get_warning(warning_id).await?;
        warning.apply_event(event)?;
        amend(&mut warning);
        self.warnings.put(warning.clone()).await?;

        tracing::info!(
            warning_id = %warning_id,
            warned_user = %warning.warned_user,
            ?event,
            status = ?warning.status,
            "warning updated"
        );
        Ok(warning)
    }

    // --- blacklist ---

    /// Write a blacklist entry for `user`, valid for the policy's duration.
    ///
    /// The decision belongs to the reviewer; eligibility is not re-checked here.
    pub async fn blacklist(&self, user: &UserId, now: DateTime<Utc>) -> Result<BlacklistEntry> {
        let entry = BlacklistEntry::new(user.clone(), now, self.policy.duration());
        self.blacklist.put(entry.clone()).await?;
        tracing::info!(%user, until = %entry.blacklisted_until, "user blacklisted");
        Ok(entry)
    }

    pub async fn is_blacklisted(&self, user: &UserId, now: DateTime<Utc>) -> Result<bool> {
        Ok(self
            .blacklist
            .get(user)
            .await?
            .is_some_and(|entry| entry.is_active(now)))
    }

    pub async fn blacklist_entry(&self, user: &UserId) -> Result<Option<BlacklistEntry>> {
        self.blacklist.get(user).await
    }

    async fn demand(&self, id: Uuid) -> Result<Demand> {
        self.demands
            .get(id)
            .await?
            .ok_or_else(|| MarketError::not_found("demand", id))
    }
}

/// True when (recipient, rater) is the demand's (client, developer) pair in either order.
fn is_counterpart(demand: &Demand, recipient: &UserId, rater: &UserId) -> bool {
    let Some(developer) = demand.assigned_developer.as_ref() else {
        return false;
    };
    let client = &demand.client_id;
    (recipient == client && rater == developer) || (recipient == developer && rater == client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryBlacklistRepository, InMemoryRatingRepository, InMemoryWarningRepository};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;
    use tenderhub_types::ManualClock;

    /// Minimal demand store for testing.
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

    struct Fixture {
        store: ReputationStore,
        demands: Arc<FakeDemands>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let demands = Arc::new(FakeDemands {
            demands: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = ReputationStore::new(
            Arc::new(InMemoryRatingRepository::new()),
            Arc::new(InMemoryWarningRepository::new()),
            Arc::new(InMemoryBlacklistRepository::new()),
            demands.clone(),
            clock.clone(),
        );
        Fixture {
            store,
            demands,
            clock,
        }
    }

    async fn demand_in(fx: &Fixture, complete: bool) -> Uuid {
        let now = fx.clock.now();
        let mut demand = Demand::new(
            "client".into(),
            "site",
            "brochure copy",
            now + Duration::hours(1),
            now + Duration::hours(48),
            now,
        );
        demand.assign("dev".into(), 100.0).unwrap();
        if complete {
            demand.complete(&"dev".into()).unwrap();
        }
        let id = demand.id;
        fx.demands.insert(demand).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_both_parties_rate_once() {
        let fx = fixture();
        let id = demand_in(&fx, true).await;
        let client = UserId::from("client");
        let dev = UserId::from("dev");

        assert!(fx.store.can_rate(id, &dev, &client).await.unwrap());
        fx.store.rate(id, &dev, &client, 5, None).await.unwrap();
        fx.store
            .rate(id, &client, &dev, 3, Some("slow to answer".into()))
            .await
            .unwrap();

        assert!(!fx.store.can_rate(id, &dev, &client).await.unwrap());
        let second = fx.store.rate(id, &dev, &client, 5, None).await;
        assert!(matches!(second, Err(MarketError::AlreadyExists(_))));

        assert_eq!(fx.store.ratings_for_demand(id).await.unwrap().len(), 2);
        assert_eq!(fx.store.average_rating(&dev).await.unwrap(), Some(5.0));
        assert_eq!(fx.store.average_given_rating(&dev).await.unwrap(), Some(3.0));
    }

    #[tokio::test]
    async fn test_rating_requires_completed_demand() {
        let fx = fixture();
        let id = demand_in(&fx, false).await;
        let result = fx
            .store
            .rate(id, &"dev".into(), &"client".into(), 4, None)
            .await;
        assert!(matches!(result, Err(MarketError::NotEligible(_))));
        assert!(!fx.store.can_rate(id, &"dev".into(), &"client".into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_rating_requires_counterpart_pair() {
        let fx = fixture();
        let id = demand_in(&fx, true).await;
        let stranger = UserId::from("stranger");

        for (recipient, rater) in [
            (UserId::from("dev"), stranger.clone()),
            (stranger.clone(), UserId::from("client")),
            (UserId::from("dev"), UserId::from("dev")),
        ] {
            let result = fx.store.rate(id, &recipient, &rater, 4, None).await;
            assert!(matches!(result, Err(MarketError::NotEligible(_))));
        }
        assert!(fx.store.ratings_for_demand(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rating_unknown_demand() {
        let fx = fixture();
        let result = fx
            .store
            .rate(Uuid::new_v4(), &"dev".into(), &"client".into(), 4, None)
            .await;
        assert!(matches!(result, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_average_rating_absent_without_ratings() {
        let fx = fixture();
        assert_eq!(fx.store.average_rating(&"nobody".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blacklist_eligibility_follows_current_count() {
        let fx = fixture();
        let dev = UserId::from("dev");

        let first = fx.store.issue_warning(&dev, None).await.unwrap();
        assert!(!fx.store.blacklist_eligible(&dev).await.unwrap());
        fx.store.issue_warning(&dev, None).await.unwrap();
        assert_eq!(fx.store.warning_count(&dev).await.unwrap(), 2);
        assert!(fx.store.blacklist_eligible(&dev).await.unwrap());

        fx.store.protest(first.id, "I delivered").await.unwrap();
        assert_eq!(fx.store.warning_count(&dev).await.unwrap(), 1);
        assert!(!fx.store.blacklist_eligible(&dev).await.unwrap());
        assert_eq!(fx.store.pending_protests().await.unwrap().len(), 1);

        let kept = fx.store.reject_protest(first.id).await.unwrap();
        assert_eq!(kept.status, WarningStatus::ActiveAndDenied);
        assert_eq!(kept.protest.as_deref(), Some("I delivered"));
        assert!(fx.store.blacklist_eligible(&dev).await.unwrap());
        assert!(fx.store.pending_protests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_accepted_protest_deactivates_warning() {
        let fx = fixture();
        let dev = UserId::from("dev");
        let warning = fx.store.issue_warning(&dev, Some("late".into())).await.unwrap();

        assert!(fx.store.accept_protest(warning.id).await.unwrap_err().is_state_conflict());
        fx.store.protest(warning.id, "was sick").await.unwrap();
        let resolved = fx.store.accept_protest(warning.id).await.unwrap();
        assert_eq!(resolved.status, WarningStatus::Inactive);
        assert_eq!(fx.store.warning_count(&dev).await.unwrap(), 0);
        assert!(fx.store.protest(warning.id, "again").await.is_err());
    }

    #[tokio::test]
    async fn test_blacklist_entry_lasts_policy_duration() {
        let fx = fixture();
        let dev = UserId::from("dev");
        let now = fx.clock.now();

        assert!(!fx.store.is_blacklisted(&dev, now).await.unwrap());
        let entry = fx.store.blacklist(&dev, now).await.unwrap();
        assert_eq!(entry.blacklisted_until, now + Duration::days(365));
        assert!(fx.store.is_blacklisted(&dev, now + Duration::days(200)).await.unwrap());
        assert!(!fx.store.is_blacklisted(&dev, now + Duration::days(366)).await.unwrap());
        assert_eq!(fx.store.blacklist_entry(&dev).await.unwrap(), Some(entry));
    }

    #[tokio::test]
    async fn test_system_rating_skips_counterpart_checks() {
        let fx = fixture();
        let id = demand_in(&fx, false).await;
        let rating = Rating::new(
            id,
            "dev".into(),
            "client".into(),
            1,
            Some("System demand overdue.".into()),
            fx.clock.now(),
        )
        .unwrap();
        fx.store.record_system_rating(rating).await.unwrap();
        assert_eq!(fx.store.average_rating(&"dev".into()).await.unwrap(), Some(1.0));
    }
}
