//! HTTP/JSON API
//!
//! Amounts travel as decimal strings of minor units both ways. Every
//! rejection is answered with `{ "error": kind, "message": text, "retryable": bool }`.

use acb_common::{
    AcbError, Amount, CreditBadge, CreditScore, Loan, LoanId, ProtocolError, Transaction, TxHash,
    User, UserId, UserProfile, VERSION,
};
use acb_protocol::{
    BorrowOutcome, BorrowQuote, DefaultOutcome, DepositOutcome, LedgerService, LpPositionView,
    OwedView, PoolView, RepaymentOutcome, WithdrawOutcome,
};
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use crate::metrics::ServerMetrics;

// ============ STATE ============

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub metrics: Arc<ServerMetrics>,
}

// ============ ERRORS ============

/// Error answered to HTTP callers
#[derive(Debug)]
pub struct ApiError(AcbError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl<E> From<E> for ApiError
where
    E: Into<AcbError>,
{
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

/// Status code for an error kind
pub fn status_for(err: &AcbError) -> StatusCode {
    match err.as_protocol() {
        Some(protocol) => match protocol {
            ProtocolError::InvalidAmount { .. }
            | ProtocolError::MalformedAmount(_)
            | ProtocolError::MalformedTxHash(_)
            | ProtocolError::InvalidInput(_)
            | ProtocolError::InvalidDuration { .. } => StatusCode::BAD_REQUEST,
            ProtocolError::NotFound { .. } => StatusCode::NOT_FOUND,
            ProtocolError::AlreadySettled { .. }
            | ProtocolError::NotOverdue { .. }
            | ProtocolError::NullifierInUse
            | ProtocolError::AlreadyMinted { .. } => StatusCode::CONFLICT,
            ProtocolError::InsufficientPosition { .. }
            | ProtocolError::InsufficientLiquidity { .. }
            | ProtocolError::PoolInsolvent { .. }
            | ProtocolError::ExceedsLimit { .. }
            | ProtocolError::VerificationRequired { .. }
            | ProtocolError::Overflow => StatusCode::UNPROCESSABLE_ENTITY,
            ProtocolError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
        },
        None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() && !self.0.is_retryable() {
            error!(error = %self.0, "Request failed");
        }
        let body = Json(json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        }));
        (status, body).into_response()
    }
}

// ============ REQUESTS ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub amount: String,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub lp_amount: String,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanRequest {
    pub amount: String,
    pub duration_days: u32,
    pub tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub nullifier: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeRequest {
    pub token_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub user_id: UserId,
    pub linked: bool,
}

fn parse_amount(raw: &str) -> ApiResult<Amount> {
    Ok(raw.parse::<Amount>()?)
}

fn parse_tx_hash(raw: Option<String>) -> ApiResult<Option<TxHash>> {
    match raw {
        Some(raw) if !raw.is_empty() => Ok(Some(TxHash::parse(&raw)?)),
        _ => Ok(None),
    }
}

// ============ ROUTER ============

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // Users
        .route("/api/v1/users", post(upsert_user))
        .route("/api/v1/users/:id", get(get_user))
        .route("/api/v1/users/:id/credit-score", get(get_credit_score))
        .route("/api/v1/users/:id/borrow-quote", get(get_borrow_quote))
        // Liquidity
        .route("/api/v1/pool", get(get_pool))
        .route("/api/v1/users/:id/lp-position", get(get_lp_position))
        .route("/api/v1/users/:id/deposit", post(deposit))
        .route("/api/v1/users/:id/withdraw", post(withdraw))
        // Loans
        .route("/api/v1/users/:id/loans", get(get_user_loans).post(request_loan))
        .route("/api/v1/users/:id/loans/:loan_id", get(get_loan))
        .route("/api/v1/users/:id/loans/:loan_id/owed", get(get_total_owed))
        .route("/api/v1/users/:id/loans/:loan_id/repay", post(repay_loan))
        .route("/api/v1/loans/:loan_id/default", post(mark_defaulted))
        .route("/api/v1/users/:id/transactions", get(get_transactions))
        // Verification and badge
        .route(
            "/api/v1/users/:id/verification",
            get(get_verification).post(link_verification),
        )
        .route("/api/v1/users/:id/badge", get(get_badge).post(mint_badge))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ HANDLERS ============

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.service.stats();
    Json(json!({
        "status": "healthy",
        "version": VERSION,
        "users": stats.users,
        "loans": stats.loans,
        "activeLoans": stats.active_loans,
        "lastCommit": stats.last_commit,
    }))
}

async fn metrics(State(state): State<AppState>) -> Response {
    state.metrics.refresh(&state.service);
    match state.metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn upsert_user(
    State(state): State<AppState>,
    Json(profile): Json<UserProfile>,
) -> ApiResult<Json<User>> {
    let started = Instant::now();
    let result = state.service.upsert_user(profile).await;
    state.metrics.observe("upsert_user", started, &result);
    Ok(Json(result?))
}

async fn get_user(State(state): State<AppState>, Path(user_id): Path<UserId>) -> ApiResult<Json<User>> {
    Ok(Json(state.service.get_user(user_id)?))
}

async fn get_credit_score(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<CreditScore> {
    Json(state.service.get_credit_score(user_id))
}

async fn get_borrow_quote(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<BorrowQuote>> {
    Ok(Json(state.service.quote_borrow(user_id)?))
}

async fn get_pool(State(state): State<AppState>) -> ApiResult<Json<PoolView>> {
    Ok(Json(state.service.get_pool()?))
}

async fn get_lp_position(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<LpPositionView>> {
    Ok(Json(state.service.get_lp_position(user_id)?))
}

async fn deposit(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<Json<DepositOutcome>> {
    let amount = parse_amount(&body.amount)?;
    let tx_hash = parse_tx_hash(body.tx_hash)?;

    let started = Instant::now();
    let result = state.service.deposit(user_id, amount, tx_hash).await;
    state.metrics.observe("deposit", started, &result);
    Ok(Json(result?))
}

async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<WithdrawRequest>,
) -> ApiResult<Json<WithdrawOutcome>> {
    let lp_amount = parse_amount(&body.lp_amount)?;
    let tx_hash = parse_tx_hash(body.tx_hash)?;

    let started = Instant::now();
    let result = state.service.withdraw(user_id, lp_amount, tx_hash).await;
    state.metrics.observe("withdraw", started, &result);
    Ok(Json(result?))
}

async fn get_user_loans(State(state): State<AppState>, Path(user_id): Path<UserId>) -> Json<Vec<Loan>> {
    Json(state.service.get_user_loans(user_id))
}

async fn request_loan(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<LoanRequest>,
) -> ApiResult<(StatusCode, Json<BorrowOutcome>)> {
    let amount = parse_amount(&body.amount)?;
    let tx_hash = parse_tx_hash(body.tx_hash)?;

    let started = Instant::now();
    let result = state
        .service
        .request_loan(user_id, amount, body.duration_days, tx_hash)
        .await;
    state.metrics.observe("request_loan", started, &result);
    Ok((StatusCode::CREATED, Json(result?)))
}

async fn get_loan(
    State(state): State<AppState>,
    Path((user_id, loan_id)): Path<(UserId, LoanId)>,
) -> ApiResult<Json<Loan>> {
    Ok(Json(state.service.get_loan(user_id, loan_id)?))
}

async fn get_total_owed(
    State(state): State<AppState>,
    Path((user_id, loan_id)): Path<(UserId, LoanId)>,
) -> ApiResult<Json<OwedView>> {
    Ok(Json(state.service.calculate_total_owed(user_id, loan_id)?))
}

async fn repay_loan(
    State(state): State<AppState>,
    Path((user_id, loan_id)): Path<(UserId, LoanId)>,
    Json(body): Json<AmountRequest>,
) -> ApiResult<Json<RepaymentOutcome>> {
    let amount = parse_amount(&body.amount)?;
    let tx_hash = parse_tx_hash(body.tx_hash)?;

    let started = Instant::now();
    let result = state
        .service
        .repay_loan(user_id, loan_id, amount, tx_hash)
        .await;
    state.metrics.observe("repay_loan", started, &result);
    Ok(Json(result?))
}

async fn mark_defaulted(
    State(state): State<AppState>,
    Path(loan_id): Path<LoanId>,
) -> ApiResult<Json<DefaultOutcome>> {
    let started = Instant::now();
    let result = state.service.mark_defaulted(loan_id).await;
    state.metrics.observe("mark_defaulted", started, &result);
    Ok(Json(result?))
}

async fn get_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<Vec<Transaction>> {
    Json(state.service.get_transactions(user_id))
}

async fn get_verification(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<VerificationStatus> {
    Json(VerificationStatus {
        user_id,
        linked: state.service.is_linked_to_verification(user_id),
    })
}

async fn link_verification(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<VerificationRequest>,
) -> ApiResult<Json<VerificationStatus>> {
    let started = Instant::now();
    let result = state.service.link_verification(user_id, &body.nullifier).await;
    state.metrics.observe("link_verification", started, &result);
    let user = result?;
    Ok(Json(VerificationStatus {
        user_id,
        linked: user.is_verified(),
    }))
}

async fn get_badge(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<CreditBadge>> {
    Ok(Json(state.service.get_credit_badge(user_id)?))
}

async fn mint_badge(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(body): Json<BadgeRequest>,
) -> ApiResult<(StatusCode, Json<CreditBadge>)> {
    let started = Instant::now();
    let result = state.service.mint_credit_badge(user_id, body.token_id).await;
    state.metrics.observe("mint_credit_badge", started, &result);
    Ok((StatusCode::CREATED, Json(result?)))
}
