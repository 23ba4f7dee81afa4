use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::AuthUser,
    ledger::handlers::ledger_error,
    ledger::service::{self, SpendOutcome},
    state::AppState,
};

use super::dto::{ConsultRequest, ConsultResponse, DailyDrawResponse, InsufficientResponse};
use super::responses;

/// Route the frontend sends users to when credits run out.
const PURCHASE_ROUTE: &str = "/comprar-tkazh";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/oracle/consult", post(consult))
        .route("/oracle/daily", post(daily_draw))
}

#[instrument(skip(state, payload))]
async fn consult(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ConsultRequest>,
) -> Result<Response, (StatusCode, String)> {
    // Charge before answering; the oracle speaks only to paid-up callers.
    let outcome =
        service::spend_credits(&state.db, &state.config.tariff, user_id, &payload.oracle_type)
            .await
            .map_err(ledger_error)?;

    match outcome {
        SpendOutcome::Charged { cost, balance } => {
            let message = responses::compose(&payload.oracle_type, &payload.question);
            info!(user_id = %user_id, oracle_type = %payload.oracle_type, cost, "consultation served");
            Ok((
                StatusCode::OK,
                Json(ConsultResponse {
                    oracle_type: payload.oracle_type,
                    message,
                    cost,
                    balance,
                }),
            )
                .into_response())
        }
        SpendOutcome::InsufficientCredits { cost, balance } => Ok((
            StatusCode::PAYMENT_REQUIRED,
            Json(InsufficientResponse {
                charged: false,
                cost,
                balance,
                redirect_to: PURCHASE_ROUTE.into(),
            }),
        )
            .into_response()),
    }
}

#[instrument(skip(state))]
async fn daily_draw(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DailyDrawResponse>, (StatusCode, String)> {
    let claimed = service::claim_free_daily(&state.db, user_id)
        .await
        .map_err(ledger_error)?;

    if claimed {
        info!(user_id = %user_id, "free daily consultation served");
        Ok(Json(DailyDrawResponse {
            available: true,
            message: Some(responses::daily().to_string()),
        }))
    } else {
        Ok(Json(DailyDrawResponse {
            available: false,
            message: None,
        }))
    }
}
