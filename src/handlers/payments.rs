// src/handlers/payments.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{
        GatewayEvent, InitiatePaymentRequest, InitiatePaymentResponse, MessageResponse, Payment,
        RecordPaymentRequest,
    },
    state::AppState,
    store::SettlementOutcome,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Pay an invoice (client). Exact-total offline transfers settle
/// immediately; other methods return a gateway checkout URL.
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "Payment initiated", body = InitiatePaymentResponse),
        (status = 409, description = "Invoice already paid or cancelled"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_payment(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<InitiatePaymentRequest>,
) -> AppResult<(StatusCode, Json<InitiatePaymentResponse>)> {
    let resp = state.settlement.initiate_payment(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Record an out-of-band payment; it settles immediately (admin)
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = RecordPaymentRequest,
    responses(
        (status = 201, description = "Payment recorded and settled", body = Payment),
        (status = 404, description = "Project not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn record_payment(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<RecordPaymentRequest>,
) -> AppResult<(StatusCode, Json<Payment>)> {
    let (payment, _) = state.settlement.record_payment(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// List payments visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    responses((status = 200, description = "Payments", body = Vec<Payment>)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn list_payments(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Payment>>> {
    Ok(Json(state.settlement.list_payments(&principal).await?))
}

/// Get a single payment
#[utoipa::path(
    get,
    path = "/api/v1/payments/{payment_id}",
    params(("payment_id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment detail", body = Payment),
        (status = 404, description = "Payment not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn get_payment(
    principal: Principal,
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<Json<Payment>> {
    Ok(Json(
        state.settlement.get_payment(&principal, payment_id).await?,
    ))
}

/// Delete a payment, reversing its settlement if it had one (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/payments/{payment_id}",
    params(("payment_id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 204, description = "Payment deleted"),
        (status = 409, description = "Partner balance no longer covers the reversal"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn delete_payment(
    principal: Principal,
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.settlement.delete_payment(&principal, payment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Gateway webhook. Unauthenticated; duplicate deliveries are no-ops.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = GatewayEvent,
    responses(
        (status = 200, description = "Event processed", body = MessageResponse),
        (status = 404, description = "Unknown payment"),
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(event): Json<GatewayEvent>,
) -> AppResult<Json<MessageResponse>> {
    let outcome = state.settlement.handle_webhook(event).await?;
    let message = match outcome {
        SettlementOutcome::Settled(_) => "settled",
        SettlementOutcome::AlreadySettled => "already settled",
        SettlementOutcome::PartiallyPaid => "recorded (invoice still open)",
        SettlementOutcome::NoInvoice => "recorded",
    };
    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
