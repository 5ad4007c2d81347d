// src/handlers/invoices.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{CreateInvoiceRequest, Invoice},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Create an invoice manually (admin)
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = Invoice),
        (status = 404, description = "Client or project not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn create_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<CreateInvoiceRequest>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let invoice = state.settlement.create_invoice(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// List invoices visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    responses((status = 200, description = "Invoices", body = Vec<Invoice>)),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn list_invoices(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Invoice>>> {
    Ok(Json(state.settlement.list_invoices(&principal).await?))
}

/// Get a single invoice
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{invoice_id}",
    params(("invoice_id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice detail", body = Invoice),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn get_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(
        state.settlement.get_invoice(&principal, invoice_id).await?,
    ))
}

/// Cancel an unpaid invoice (admin)
#[utoipa::path(
    put,
    path = "/api/v1/invoices/{invoice_id}/cancel",
    params(("invoice_id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice cancelled", body = Invoice),
        (status = 409, description = "Invoice already paid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn cancel_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(
        state.settlement.cancel_invoice(&principal, invoice_id).await?,
    ))
}

/// Delete an invoice without recorded payments (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/invoices/{invoice_id}",
    params(("invoice_id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 204, description = "Invoice deleted"),
        (status = 409, description = "Payments reference this invoice"),
    ),
    security(("bearer_auth" = [])),
    tag = "Invoices"
)]
pub async fn delete_invoice(
    principal: Principal,
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.settlement.delete_invoice(&principal, invoice_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
