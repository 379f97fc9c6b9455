use std::sync::Arc;

use axum::extract::{Extension, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use workbridge_account::model::Subject;
use workbridge_core::{PageParams, ServiceError};

use crate::ledger::RewardLedger;
use crate::model::{RewardHistoryPage, WithdrawBody, WithdrawRequest};

type LedgerState = Arc<RewardLedger>;

pub fn router(ledger: Arc<RewardLedger>) -> Router {
    Router::new()
        .route("/withdraw", post(request_withdrawal))
        .route("/withdrawals", get(withdraw_status))
        .route("/history", get(reward_history))
        .with_state(ledger)
}

// ---------------------------------------------------------------------------
// POST /withdraw
// ---------------------------------------------------------------------------

async fn request_withdrawal(
    State(ledger): State<LedgerState>,
    Extension(subject): Extension<Subject>,
    Json(body): Json<WithdrawBody>,
) -> Result<Json<WithdrawRequest>, ServiceError> {
    let request =
        ledger.request_withdrawal(subject.worker_id()?, body.amount, &body.payment_method)?;
    Ok(Json(request))
}

// ---------------------------------------------------------------------------
// GET /withdrawals
// ---------------------------------------------------------------------------

async fn withdraw_status(
    State(ledger): State<LedgerState>,
    Extension(subject): Extension<Subject>,
    Query(page): Query<PageParams>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let result = ledger.withdraw_status(subject.worker_id()?, page)?;
    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
    })))
}

// ---------------------------------------------------------------------------
// GET /history
// ---------------------------------------------------------------------------

async fn reward_history(
    State(ledger): State<LedgerState>,
    Extension(subject): Extension<Subject>,
    Query(page): Query<PageParams>,
) -> Result<Json<RewardHistoryPage>, ServiceError> {
    let history = ledger.reward_history(subject.worker_id()?, page)?;
    Ok(Json(history))
}
