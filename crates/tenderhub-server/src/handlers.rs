use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tenderhub_lifecycle::{Assignment, DemandQuery, DemandView, NewDemand};
use tenderhub_sweeper::SweepReport;
use tenderhub_types::{
    Bid, BlacklistEntry, Demand, MarketError, Notification, Rating, Transaction, UserId, Warning,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/demands", post(create_demand).get(list_demands))
        .route("/api/v1/demands/{demand_id}", get(get_demand))
        .route(
            "/api/v1/demands/{demand_id}/bids",
            post(place_bid).get(list_bids),
        )
        .route("/api/v1/demands/{demand_id}/assignment", post(choose_developer))
        .route("/api/v1/demands/{demand_id}/completion", post(submit_completion))
        .route(
            "/api/v1/demands/{demand_id}/ratings",
            post(rate).get(list_ratings),
        )
        .route(
            "/api/v1/demands/{demand_id}/ratings/{recipient}",
            get(rating_form),
        )
        .route("/api/v1/transactions/pending", get(pending_transactions))
        .route("/api/v1/transactions/{transaction_id}", get(get_transaction))
        .route(
            "/api/v1/transactions/{transaction_id}/approve",
            post(approve_transaction),
        )
        .route(
            "/api/v1/transactions/{transaction_id}/deny",
            post(deny_transaction),
        )
        .route("/api/v1/warnings/protests", get(pending_protests))
        .route("/api/v1/warnings/{warning_id}", get(get_warning))
        .route("/api/v1/warnings/{warning_id}/protest", post(protest_warning))
        .route("/api/v1/warnings/{warning_id}/accept", post(accept_protest))
        .route("/api/v1/warnings/{warning_id}/reject", post(reject_protest))
        .route("/api/v1/users/{user_id}/bids", get(user_bids))
        .route(
            "/api/v1/users/{user_id}/warnings",
            get(user_warnings).post(issue_warning),
        )
        .route("/api/v1/users/{user_id}/standing", get(user_standing))
        .route("/api/v1/users/{user_id}/projects", get(user_projects))
        .route("/api/v1/users/{user_id}/transactions", get(user_transactions))
        .route("/api/v1/users/{user_id}/notifications", get(user_notifications))
        .route("/api/v1/users/{user_id}/balance", get(user_balance))
        .route("/api/v1/users/{user_id}/deposit", post(deposit))
        .route("/api/v1/users/{user_id}/blacklist", post(blacklist_user))
        .route("/api/v1/sweep", post(run_sweep))
        .route("/health", get(health))
        .with_state(state)
}

/// A `MarketError` rendered as an HTTP response.
pub struct ApiError(MarketError);

impl From<MarketError> for ApiError {
    fn from(e: MarketError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            MarketError::NotFound { .. } => StatusCode::NOT_FOUND,
            MarketError::Unauthorized(_) => StatusCode::FORBIDDEN,
            MarketError::InvalidState(_)
            | MarketError::InvalidStateTransition { .. }
            | MarketError::DemandNotOpen(_)
            | MarketError::AlreadyExists(_) => StatusCode::CONFLICT,
            MarketError::InvalidAmount(_) | MarketError::NotEligible(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MarketError::Storage(_) | MarketError::Notification(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> &'static str {
    "ok"
}

// --- demands ---

async fn create_demand(
    State(state): State<AppState>,
    Json(req): Json<NewDemand>,
) -> ApiResult<(StatusCode, Json<Demand>)> {
    let demand = state.engine.create_demand(req).await?;
    Ok((StatusCode::CREATED, Json(demand)))
}

async fn list_demands(
    State(state): State<AppState>,
    Query(query): Query<DemandQuery>,
) -> ApiResult<Json<Vec<DemandView>>> {
    let mut views = Vec::new();
    for demand in state.engine.filter(&query).await? {
        views.push(state.engine.to_view(demand).await?);
    }
    Ok(Json(views))
}

async fn get_demand(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
) -> ApiResult<Json<DemandView>> {
    Ok(Json(state.engine.view(demand_id).await?))
}

#[derive(Deserialize)]
struct PlaceBidRequest {
    developer_id: UserId,
    amount: f64,
}

async fn place_bid(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
    Json(req): Json<PlaceBidRequest>,
) -> ApiResult<(StatusCode, Json<Bid>)> {
    let bid = state
        .bids
        .place_bid(demand_id, &req.developer_id, req.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(bid)))
}

async fn list_bids(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Bid>>> {
    state.engine.get(demand_id).await?;
    Ok(Json(state.bids.bids_for(demand_id).await?))
}

#[derive(Deserialize)]
struct ChooseDeveloperRequest {
    client_id: UserId,
    developer_id: UserId,
    amount: f64,
    #[serde(default)]
    reason: Option<String>,
}

async fn choose_developer(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
    Json(req): Json<ChooseDeveloperRequest>,
) -> ApiResult<Json<Assignment>> {
    let assignment = state
        .engine
        .choose_developer(
            demand_id,
            &req.client_id,
            &req.developer_id,
            req.amount,
            req.reason,
        )
        .await?;
    Ok(Json(assignment))
}

#[derive(Deserialize)]
struct CompletionRequest {
    developer_id: UserId,
}

async fn submit_completion(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
    Json(req): Json<CompletionRequest>,
) -> ApiResult<Json<Demand>> {
    Ok(Json(
        state
            .engine
            .submit_completion(demand_id, &req.developer_id)
            .await?,
    ))
}

// --- ratings ---

#[derive(Deserialize)]
struct RateRequest {
    recipient: UserId,
    rater: UserId,
    score: u8,
    #[serde(default)]
    message: Option<String>,
}

async fn rate(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
    Json(req): Json<RateRequest>,
) -> ApiResult<(StatusCode, Json<Rating>)> {
    let rating = state
        .reputation
        .rate(demand_id, &req.recipient, &req.rater, req.score, req.message)
        .await?;
    Ok((StatusCode::CREATED, Json(rating)))
}

async fn list_ratings(
    State(state): State<AppState>,
    Path(demand_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Rating>>> {
    Ok(Json(state.reputation.ratings_for_demand(demand_id).await?))
}

#[derive(Deserialize)]
struct RatingFormQuery {
    rater: UserId,
}

#[derive(Serialize)]
struct RatingFormResponse {
    demand_id: Uuid,
    recipient: UserId,
    rater: UserId,
    can_rate: bool,
}

async fn rating_form(
    State(state): State<AppState>,
    Path((demand_id, recipient)): Path<(Uuid, UserId)>,
    Query(query): Query<RatingFormQuery>,
) -> ApiResult<Json<RatingFormResponse>> {
    let can_rate = state
        .reputation
        .can_rate(demand_id, &recipient, &query.rater)
        .await?;
    Ok(Json(RatingFormResponse {
        demand_id,
        recipient,
        rater: query.rater,
        can_rate,
    }))
}

// --- transactions ---

async fn pending_transactions(State(state): State<AppState>) -> ApiResult<Json<Vec<Transaction>>> {
    Ok(Json(state.ledger.list_pending().await?))
}

async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(state.ledger.get(transaction_id).await?))
}

async fn approve_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(state.ledger.approve(transaction_id).await?))
}

#[derive(Serialize)]
struct DenialResponse {
    transaction: Transaction,
    warning: Warning,
}

async fn deny_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> ApiResult<Json<DenialResponse>> {
    let (transaction, warning) = state.ledger.deny(transaction_id).await?;
    Ok(Json(DenialResponse {
        transaction,
        warning,
    }))
}

// --- warnings ---

async fn pending_protests(State(state): State<AppState>) -> ApiResult<Json<Vec<Warning>>> {
    Ok(Json(state.reputation.pending_protests().await?))
}

async fn get_warning(
    State(state): State<AppState>,
    Path(warning_id): Path<Uuid>,
) -> ApiResult<Json<Warning>> {
    Ok(Json(state.reputation.get_warning(warning_id).await?))
}

#[derive(Deserialize)]
struct ProtestRequest {
    reason: String,
}

async fn protest_warning(
    State(state): State<AppState>,
    Path(warning_id): Path<Uuid>,
    Json(req): Json<ProtestRequest>,
) -> ApiResult<Json<Warning>> {
    Ok(Json(state.reputation.protest(warning_id, req.reason).await?))
}

async fn accept_protest(
    State(state): State<AppState>,
    Path(warning_id): Path<Uuid>,
) -> ApiResult<Json<Warning>> {
    Ok(Json(state.reputation.accept_protest(warning_id).await?))
}

async fn reject_protest(
    State(state): State<AppState>,
    Path(warning_id): Path<Uuid>,
) -> ApiResult<Json<Warning>> {
    Ok(Json(state.reputation.reject_protest(warning_id).await?))
}

// --- users ---

async fn user_bids(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Vec<Bid>>> {
    Ok(Json(state.bids.bids_by_developer(&user_id).await?))
}

async fn user_warnings(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<Vec<Warning>>> {
    Ok(Json(state.reputation.warnings_for(&user_id).await?))
}

#[derive(Deserialize)]
struct IssueWarningRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn issue_warning(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<IssueWarningRequest>,
) -> ApiResult<(StatusCode, Json<Warning>)> {
    let warning = state.reputation.issue_warning(&user_id, req.reason).await?;
    Ok((StatusCode::CREATED, Json(warning)))
}

#[derive(Serialize)]
struct StandingResponse {
    user_id: UserId,
    average_rating: Option<f64>,
    average_given_rating: Option<f64>,
    warning_count: usize,
    blacklist_eligible: bool,
    blacklisted: bool,
    blacklist_entry: Option<BlacklistEntry>,
}

async fn user_standing(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<StandingResponse>> {
    let reputation = &state.reputation;
    let now = state.clock.now();
    Ok(Json(StandingResponse {
        average_rating: reputation.average_rating(&user_id).await?,
        average_given_rating: reputation.average_given_rating(&user_id).await?,
        warning_count: reputation.warning_count(&user_id).await?,
        blacklist_eligible: reputation.blacklist_eligible(&user_id).await?,
        blacklisted: reputation.is_blacklisted(&user_id, now).await?,
        blacklist_entry: reputation.blacklist_entry(&user_id).await?,
        user_id,
    }))
}

#[derive(Serialize)]
struct ProjectsResponse {
    current: Vec<Demand>,
    past: Vec<Demand>,
}

async fn user_projects(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<ProjectsResponse>> {
    Ok(Json(ProjectsResponse {
        current: state.engine.current_projects(&user_id).await?,
        past: state.engine.past_projects(&user_id).await?,
    }))
}

#[derive(Serialize)]
struct UserTransactionsResponse {
    received: Vec<Transaction>,
    sent: Vec<Transaction>,
}

async fn user_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<UserTransactionsResponse>> {
    Ok(Json(UserTransactionsResponse {
        received: state.ledger.list_by_recipient(&user_id).await?,
        sent: state.ledger.list_by_sender(&user_id).await?,
    }))
}

async fn user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<Notification>> {
    Json(state.inbox.for_recipient(&user_id).await)
}

#[derive(Serialize)]
struct BalanceResponse {
    user_id: UserId,
    balance: f64,
}

async fn user_balance(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<BalanceResponse> {
    let balance = state.accounts.balance_of(&user_id);
    Json(BalanceResponse { user_id, balance })
}

#[derive(Deserialize)]
struct DepositRequest {
    amount: f64,
}

async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<Json<BalanceResponse>> {
    let balance = state.accounts.deposit(&user_id, req.amount)?;
    Ok(Json(BalanceResponse { user_id, balance }))
}

async fn blacklist_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<(StatusCode, Json<BlacklistEntry>)> {
    let entry = state
        .reputation
        .blacklist(&user_id, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// --- sweep ---

async fn run_sweep(State(state): State<AppState>) -> ApiResult<Json<SweepReport>> {
    Ok(Json(state.sweeper.sweep(state.clock.now()).await?))
}
