use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenderhub_bidding::BidBook;
use tenderhub_ledger::Ledger;
use tenderhub_reputation::ReputationStore;
use tenderhub_types::{
    Accounts, Clock, Demand, DemandRepository, DemandStatus, KeyedLocks, MarketError, Notifier,
    Rating, Result, Transaction, UserId, round_cents, tags_intersect, validate_amount,
};

use crate::policy::LifecyclePolicy;
use crate::query::DemandQuery;
use crate::view::DemandView;

const OVERDUE_RATING_MESSAGE: &str = "System demand overdue.";

/// Input for `DemandEngine::create_demand`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDemand {
    pub client_id: UserId,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub specification: String,
    pub bidding_deadline: DateTime<Utc>,
    pub submission_deadline: DateTime<Utc>,
}

/// Result of choosing a developer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub demand: Demand,
    /// The Pending advance paid from client to developer.
    pub advance_transaction: Uuid,
    pub advance: f64,
}

/// What one deadline visit did to a demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeadlineOutcome {
    pub notices_sent: usize,
    pub bidding_expired: bool,
    pub overdue: bool,
    pub transactions: Vec<Uuid>,
}

impl DeadlineOutcome {
    pub fn is_noop(&self) -> bool {
        self.notices_sent == 0 && !self.bidding_expired && !self.overdue
    }
}

/// A message queued during a transition, delivered after the commit.
struct Notice {
    recipient: UserId,
    sender: UserId,
    message: String,
}

/// Everything a deadline visit wants to write, staged before anything is written.
#[derive(Default)]
struct Effects {
    transactions: Vec<Transaction>,
    rating: Option<Rating>,
    notices: Vec<Notice>,
}

/// The demand state machine.
///
/// Every transition takes the demand's lock, decides its full effect set on a
/// copy of the demand, commits ledger records and ratings, writes the demand,
/// and only then delivers notifications. A failed write undoes the earlier ones.
pub struct DemandEngine {
    demands: Arc<dyn DemandRepository>,
    bids: Arc<BidBook>,
    ledger: Arc<Ledger>,
    reputation: Arc<ReputationStore>,
    notifier: Arc<dyn Notifier>,
    accounts: Option<Arc<dyn Accounts>>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks>,
    policy: LifecyclePolicy,
}

impl DemandEngine {
    pub fn new(
        demands: Arc<dyn DemandRepository>,
        bids: Arc<BidBook>,
        ledger: Arc<Ledger>,
        reputation: Arc<ReputationStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            demands,
            bids,
            ledger,
            reputation,
            notifier,
            accounts: None,
            clock,
            locks,
            policy: LifecyclePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Consult an account book before assignment. Shortfalls are logged, not enforced.
    pub fn with_accounts(mut self, accounts: Arc<dyn Accounts>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    // --- commands ---

    pub async fn create_demand(&self, new: NewDemand) -> Result<Demand> {
        if new.submission_deadline < new.bidding_deadline {
            return Err(MarketError::InvalidState(
                "submission deadline precedes bidding deadline".to_string(),
            ));
        }
        let demand = Demand::new(
            new.client_id,
            new.title,
            new.specification,
            new.bidding_deadline,
            new.submission_deadline,
            self.clock.now(),
        )
        .with_tags(new.tags);
        self.demands.insert(demand.clone()).await?;

        tracing::info!(
            demand_id = %demand.id,
            client = %demand.client_id,
            bidding_deadline = %demand.bidding_deadline,
            submission_deadline = %demand.submission_deadline,
            "demand created"
        );
        Ok(demand)
    }

    /// Open -> Assigned. The client picks `developer` at `amount` and pays the advance.
    pub async fn choose_developer(
        &self,
        demand_id: Uuid,
        client: &UserId,
        developer: &UserId,
        amount: f64,
        reason: Option<String>,
    ) -> Result<Assignment> {
        let guard = self.locks.acquire(demand_id).await;
        let mut demand = self.get(demand_id).await?;
        if &demand.client_id != client {
            return Err(MarketError::Unauthorized(format!(
                "{client} does not own demand {demand_id}"
            )));
        }
        let amount = round_cents(validate_amount(amount)?);

        let mut next = demand.clone();
        next.assign(developer.clone(), amount)?;
        if self.policy.require_bid_for_assignment && !self.bids.has_bid(demand_id, developer).await? {
            return Err(MarketError::NotEligible(format!(
                "{developer} has not bid on demand {demand_id}"
            )));
        }

        let advance = round_cents(amount * self.policy.advance_ratio);
        if let Some(accounts) = &self.accounts {
            match accounts.can_afford(client, advance).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    demand_id = %demand_id,
                    %client,
                    advance,
                    "client balance does not cover the advance"
                ),
                Err(e) => tracing::warn!(demand_id = %demand_id, error = %e, "balance check failed"),
            }
        }

        let transaction = self.ledger.prepare(developer, client, advance, reason)?;
        let advance_transaction = transaction.id;
        self.commit(&next, std::slice::from_ref(&transaction), None).await?;
        demand = next;
        drop(guard);

        tracing::info!(
            demand_id = %demand_id,
            %developer,
            amount,
            advance,
            transaction_id = %advance_transaction,
            "developer chosen"
        );

        let message = format!(
            "Congratulations! You were chosen by {client} for the {} demand.",
            demand.title
        );
        self.deliver(Notice {
            recipient: developer.clone(),
            sender: client.clone(),
            message,
        })
        .await;

        Ok(Assignment {
            demand,
            advance_transaction,
            advance,
        })
    }

    /// Assigned -> Completed, on behalf of the assigned developer.
    pub async fn submit_completion(&self, demand_id: Uuid, developer: &UserId) -> Result<Demand> {
        let demand = {
            let _guard = self.locks.acquire(demand_id).await;
            let mut demand = self.get(demand_id).await?;
            demand.complete(developer)?;
            self.demands.put(demand.clone()).await?;
            demand
        };

        tracing::info!(demand_id = %demand_id, %developer, "completion submitted");

        let client = demand.client_id.clone();
        self.deliver(Notice {
            recipient: client.clone(),
            sender: developer.clone(),
            message: format!(
                "The system for the {} demand has been uploaded. Please rate {developer} at {}.",
                demand.title,
                rating_link(demand_id, developer, &client)
            ),
        })
        .await;
        self.deliver(Notice {
            recipient: developer.clone(),
            sender: client.clone(),
            message: format!(
                "You completed the {} demand. Please rate {client} at {}.",
                demand.title,
                rating_link(demand_id, &client, developer)
            ),
        })
        .await;

        Ok(demand)
    }

    /// Apply every deadline rule that is due for one demand at `now`.
    ///
    /// Rules run in order: bidding notice, bidding expiry, submission notice,
    /// overdue. Each is gated by a sticky flag or the demand's status, so a
    /// repeat visit with the same `now` changes nothing.
    pub async fn advance_deadlines(&self, demand_id: Uuid, now: DateTime<Utc>) -> Result<DeadlineOutcome> {
        let mut outcome = DeadlineOutcome::default();
        let effects = {
            let _guard = self.locks.acquire(demand_id).await;
            let demand = self.get(demand_id).await?;
            if demand.status.is_terminal() {
                return Ok(outcome);
            }

            let mut next = demand.clone();
            let effects = self.stage_deadline_effects(&mut next, now, &mut outcome).await?;
            if outcome.is_noop() {
                tracing::debug!(demand_id = %demand_id, status = ?demand.status, "no deadline due");
                return Ok(outcome);
            }

            self.commit(&next, &effects.transactions, effects.rating.as_ref()).await?;
            outcome.transactions = effects.transactions.iter().map(|t| t.id).collect();

            if demand.status != next.status {
                tracing::info!(
                    demand_id = %demand_id,
                    from = ?demand.status,
                    to = ?next.status,
                    transactions = effects.transactions.len(),
                    "deadline transition"
                );
            }
            effects
        };

        for notice in effects.notices {
            self.deliver(notice).await;
        }
        Ok(outcome)
    }

    async fn stage_deadline_effects(
        &self,
        demand: &mut Demand,
        now: DateTime<Utc>,
        outcome: &mut DeadlineOutcome,
    ) -> Result<Effects> {
        let mut effects = Effects::default();
        let system = self.policy.system_account.clone();
        let window = self.policy.notice_window_days;

        if demand.bidding_notice_due(now, window) {
            demand.bidding_deadline_notified = true;
            outcome.notices_sent += 1;
            effects.notices.push(Notice {
                recipient: demand.client_id.clone(),
                sender: system.clone(),
                message: format!("The deadline for your {} demand is approaching.", demand.title),
            });
        }

        let bid_count = self.bids.bid_count(demand.id).await?;
        if demand.bidding_expiry_due(now, bid_count) {
            demand.expire_bidding()?;
            let fee = round_cents(self.policy.expiry_fee);
            effects.transactions.push(self.ledger.prepare(
                &system,
                &demand.client_id,
                fee,
                Some(format!("bidding expired on demand {}", demand.id)),
            )?);
            outcome.bidding_expired = true;
            outcome.notices_sent += 1;
            effects.notices.push(Notice {
                recipient: demand.client_id.clone(),
                sender: system.clone(),
                message: format!(
                    "Your {} demand expired at {}. ${fee:.2} is taken off of your balance.",
                    demand.title, demand.bidding_deadline
                ),
            });
        }

        if demand.submission_notice_due(now, window) {
            if let Some(developer) = demand.assigned_developer.clone() {
                demand.submission_deadline_notified = true;
                outcome.notices_sent += 1;
                effects.notices.push(Notice {
                    recipient: developer,
                    sender: system.clone(),
                    message: format!(
                        "The deadline for submitting your system for the {} demand is approaching.",
                        demand.title
                    ),
                });
            }
        }

        if demand.overdue_due(now) {
            let developer = demand.assigned_developer.clone().ok_or_else(|| {
                MarketError::InvalidState(format!("demand {} has no developer", demand.id))
            })?;
            let agreed = demand.agreed_amount.unwrap_or(0.0);
            demand.mark_overdue()?;

            let fee = round_cents(agreed + self.policy.overdue_penalty);
            effects.transactions.push(self.ledger.prepare(
                &demand.client_id,
                &developer,
                fee,
                Some(format!("overdue penalty on demand {}", demand.id)),
            )?);
            effects.rating = Some(Rating::new(
                demand.id,
                developer.clone(),
                demand.client_id.clone(),
                1,
                Some(OVERDUE_RATING_MESSAGE.to_string()),
                now,
            )?);
            outcome.overdue = true;
            outcome.notices_sent += 1;
            effects.notices.push(Notice {
                recipient: developer,
                sender: system,
                message: format!(
                    "The deadline for submitting the system demand {} is over. ${fee:.2} is taken off your balance as a penalty fee.",
                    demand.title
                ),
            });
        }

        Ok(effects)
    }

    /// Write a transition's ledger records, then its rating, then the demand.
    ///
    /// If any write fails, the writes already made are taken back before the
    /// error is returned, so a retry starts from the state before the transition.
    /// Must be called with the demand's lock held.
    async fn commit(
        &self,
        next: &Demand,
        transactions: &[Transaction],
        rating: Option<&Rating>,
    ) -> Result<()> {
        let mut appended = Vec::with_capacity(transactions.len());
        let mut rated = false;

        let result: Result<()> = async {
            for transaction in transactions {
                self.ledger.append(transaction.clone()).await?;
                appended.push(transaction.id);
            }
            if let Some(rating) = rating {
                self.reputation.record_system_rating(rating.clone()).await?;
                rated = true;
            }
            self.demands.put(next.clone()).await
        }
        .await;

        if let Err(e) = &result {
            tracing::warn!(demand_id = %next.id, error = %e, "transition failed, rolling back");
            if let Some(rating) = rating.filter(|_| rated) {
                if let Err(undo) = self
                    .reputation
                    .retract_system_rating(rating.demand_id, &rating.recipient)
                    .await
                {
                    tracing::error!(demand_id = %next.id, error = %undo, "rating rollback failed");
                }
            }
            for id in appended.into_iter().rev() {
                if let Err(undo) = self.ledger.retract(id).await {
                    tracing::error!(transaction_id = %id, error = %undo, "ledger rollback failed");
                }
            }
        }
        result
    }

    async fn deliver(&self, notice: Notice) {
        if let Err(e) = self
            .notifier
            .notify(&notice.recipient, &notice.sender, &notice.message)
            .await
        {
            tracing::warn!(recipient = %notice.recipient, error = %e, "notification failed");
        }
    }

    // --- reads ---

    pub async fn get(&self, id: Uuid) -> Result<Demand> {
        self.demands
            .get(id)
            .await?
            .ok_or_else(|| MarketError::not_found("demand", id))
    }

    pub async fn view(&self, id: Uuid) -> Result<DemandView> {
        let demand = self.get(id).await?;
        self.to_view(demand).await
    }

    pub async fn to_view(&self, demand: Demand) -> Result<DemandView> {
        let lowest = self.bids.lowest_bid(demand.id).await?.map(|b| b.amount);
        let count = self.bids.bid_count(demand.id).await?;
        Ok(DemandView::new(demand, lowest, count, self.clock.now()))
    }

    /// Every demand, most recently created first.
    pub async fn list_all(&self) -> Result<Vec<Demand>> {
        let mut demands = self.demands.scan().await?;
        demands.reverse();
        demands.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(demands)
    }

    /// Ids of demands that can still change.
    pub async fn in_flight(&self) -> Result<Vec<Uuid>> {
        Ok(self
            .demands
            .scan()
            .await?
            .into_iter()
            .filter(|d| !d.status.is_terminal())
            .map(|d| d.id)
            .collect())
    }

    /// Demands matching every set field of `query`, most recent first.
    pub async fn filter(&self, query: &DemandQuery) -> Result<Vec<Demand>> {
        let now = self.clock.now();
        let mut matched = Vec::new();

        for demand in self.list_all().await? {
            if query.posted_from.is_some_and(|from| demand.created_at < from)
                || query.posted_to.is_some_and(|to| demand.created_at > to)
            {
                continue;
            }
            if query.client.as_ref().is_some_and(|c| c != &demand.client_id) {
                continue;
            }
            if query.active_only && !demand.is_active(now) {
                continue;
            }
            if let Some(min_rating) = query.min_client_rating {
                let rating = self.reputation.average_rating(&demand.client_id).await?;
                if !rating.is_some_and(|r| r >= min_rating) {
                    continue;
                }
            }
            if let Some(min_bid) = query.min_bid {
                let lowest = self.bids.lowest_bid(demand.id).await?;
                if lowest.is_some_and(|b| b.amount < min_bid) {
                    continue;
                }
            }
            if let Some(tags) = query.tag_text() {
                if !tags_intersect(tags, &demand.tags.join(" ")) {
                    continue;
                }
            }
            matched.push(demand);
        }
        Ok(matched)
    }

    /// Assigned demands where `user` is the client or the developer.
    pub async fn current_projects(&self, user: &UserId) -> Result<Vec<Demand>> {
        self.projects_in(user, DemandStatus::Assigned).await
    }

    /// Completed demands where `user` is the client or the developer.
    pub async fn past_projects(&self, user: &UserId) -> Result<Vec<Demand>> {
        self.projects_in(user, DemandStatus::Completed).await
    }

    async fn projects_in(&self, user: &UserId, status: DemandStatus) -> Result<Vec<Demand>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|d| d.status == status && d.involves(user))
            .collect())
    }
}

/// Path of the rating form for `rater` rating `recipient` on a demand.
fn rating_link(demand_id: Uuid, recipient: &UserId, rater: &UserId) -> String {
    format!("/api/v1/demands/{demand_id}/ratings/{recipient}?rater={rater}")
}
