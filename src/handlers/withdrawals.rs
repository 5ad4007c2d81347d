// src/handlers/withdrawals.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{ProcessWithdrawalRequest, RequestWithdrawalRequest, Withdrawal},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Request a withdrawal against the available balance (partner)
#[utoipa::path(
    post,
    path = "/api/v1/withdrawals",
    request_body = RequestWithdrawalRequest,
    responses(
        (status = 201, description = "Withdrawal requested", body = Withdrawal),
        (status = 422, description = "Insufficient balance"),
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn request_withdrawal(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<RequestWithdrawalRequest>,
) -> AppResult<(StatusCode, Json<Withdrawal>)> {
    let withdrawal = state.withdrawals.request(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// List withdrawals visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/withdrawals",
    responses((status = 200, description = "Withdrawals", body = Vec<Withdrawal>)),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn list_withdrawals(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Withdrawal>>> {
    Ok(Json(state.withdrawals.list(&principal).await?))
}

/// Get a single withdrawal
#[utoipa::path(
    get,
    path = "/api/v1/withdrawals/{withdrawal_id}",
    params(("withdrawal_id" = Uuid, Path, description = "Withdrawal ID")),
    responses(
        (status = 200, description = "Withdrawal detail", body = Withdrawal),
        (status = 404, description = "Withdrawal not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn get_withdrawal(
    principal: Principal,
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> AppResult<Json<Withdrawal>> {
    Ok(Json(
        state.withdrawals.get(&principal, withdrawal_id).await?,
    ))
}

/// Approve, pay out, or reject a withdrawal (admin)
#[utoipa::path(
    put,
    path = "/api/v1/withdrawals/{withdrawal_id}/process",
    params(("withdrawal_id" = Uuid, Path, description = "Withdrawal ID")),
    request_body = ProcessWithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal processed", body = Withdrawal),
        (status = 409, description = "Withdrawal already finalized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn process_withdrawal(
    principal: Principal,
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
    Json(body): Json<ProcessWithdrawalRequest>,
) -> AppResult<Json<Withdrawal>> {
    Ok(Json(
        state
            .withdrawals
            .process(&principal, withdrawal_id, body)
            .await?,
    ))
}

/// Delete a withdrawal, restoring any held funds (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/withdrawals/{withdrawal_id}",
    params(("withdrawal_id" = Uuid, Path, description = "Withdrawal ID")),
    responses(
        (status = 204, description = "Withdrawal deleted"),
        (status = 404, description = "Withdrawal not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Withdrawals"
)]
pub async fn delete_withdrawal(
    principal: Principal,
    State(state): State<AppState>,
    Path(withdrawal_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state
        .withdrawals
        .delete(&principal, withdrawal_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
