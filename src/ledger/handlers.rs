use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{
    auth::{AuthUser, ServiceRole},
    state::AppState,
};

use super::dto::{
    BalanceResponse, CostsResponse, DailyBonusResponse, GrantRequest, GrantResponse, HistoryQuery,
    SpendRequest, SpendResponse,
};
use super::repo::TkazhTransaction;
use super::service::{self, LedgerError, SpendOutcome};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tkazh/balance", get(balance))
        .route("/tkazh/spend", post(spend))
        .route("/tkazh/grant", post(grant))
        .route("/tkazh/daily-bonus", post(daily_bonus))
        .route("/tkazh/history", get(history))
        .route("/tkazh/costs", get(costs))
}

#[instrument(skip(state))]
async fn balance(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    let summary = service::get_user_credits(&state.db, &state.config.tariff, user_id)
        .await
        .map_err(ledger_error)?;
    Ok(Json(summary.into()))
}

#[instrument(skip(state, payload))]
async fn spend(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SpendRequest>,
) -> Result<(StatusCode, Json<SpendResponse>), (StatusCode, String)> {
    let outcome = service::spend_credits(&state.db, &state.config.tariff, user_id, &payload.oracle_type)
        .await
        .map_err(ledger_error)?;

    match outcome {
        SpendOutcome::Charged { cost, balance } => {
            info!(user_id = %user_id, oracle_type = %payload.oracle_type, cost, balance, "credits spent");
            Ok((
                StatusCode::OK,
                Json(SpendResponse {
                    charged: true,
                    cost,
                    balance,
                }),
            ))
        }
        SpendOutcome::InsufficientCredits { cost, balance } => Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(SpendResponse {
                charged: false,
                cost,
                balance,
            }),
        )),
    }
}

#[instrument(skip(state, payload))]
async fn grant(
    State(state): State<AppState>,
    _service: ServiceRole,
    Json(payload): Json<GrantRequest>,
) -> Result<Json<GrantResponse>, (StatusCode, String)> {
    let balance = service::add_credits(
        &state.db,
        payload.user_id,
        payload.amount,
        &payload.reason,
        payload.kind.into(),
        payload.metadata,
    )
    .await
    .map_err(ledger_error)?;

    info!(user_id = %payload.user_id, amount = payload.amount, "credits granted");
    Ok(Json(GrantResponse { balance }))
}

#[instrument(skip(state))]
async fn daily_bonus(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DailyBonusResponse>, (StatusCode, String)> {
    let granted = service::give_vip_daily_bonus(&state.db, &state.config.tariff, user_id)
        .await
        .map_err(ledger_error)?;

    let amount = if granted { state.config.tariff.daily_bonus } else { 0 };
    Ok(Json(DailyBonusResponse { granted, amount }))
}

#[instrument(skip(state))]
async fn history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<TkazhTransaction>>, (StatusCode, String)> {
    let rows = service::transaction_history(&state.db, user_id, q.limit)
        .await
        .map_err(ledger_error)?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
async fn costs(State(state): State<AppState>) -> Json<CostsResponse> {
    let tariff = &state.config.tariff;
    Json(CostsResponse {
        costs: tariff.oracle_costs.clone(),
        default_cost: tariff.default_oracle_cost,
    })
}

pub(crate) fn ledger_error(e: LedgerError) -> (StatusCode, String) {
    match e {
        LedgerError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".into()),
        LedgerError::InvalidAmount => (StatusCode::BAD_REQUEST, "Amount must be positive".into()),
        LedgerError::Store(e) => {
            error!(error = %e, "ledger store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}
