// src/handlers/finance.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{GstReport, PartnerEarnings, Revenue},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

/// Monthly revenue rollup (admin)
#[utoipa::path(
    get,
    path = "/api/v1/finance/revenue",
    responses((status = 200, description = "Monthly revenue", body = Vec<Revenue>)),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn revenue_summary(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Revenue>>> {
    Ok(Json(state.reports.revenue_summary(&principal).await?))
}

/// Quarterly GST rollup (admin)
#[utoipa::path(
    get,
    path = "/api/v1/finance/gst",
    responses((status = 200, description = "GST reports", body = Vec<GstReport>)),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn gst_summary(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<GstReport>>> {
    Ok(Json(state.reports.gst_summary(&principal).await?))
}

/// A partner's earnings and available balance
#[utoipa::path(
    get,
    path = "/api/v1/finance/partners/{partner_id}/earnings",
    params(("partner_id" = Uuid, Path, description = "Partner ID")),
    responses(
        (status = 200, description = "Partner earnings", body = PartnerEarnings),
        (status = 404, description = "Partner not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Finance"
)]
pub async fn partner_earnings(
    principal: Principal,
    State(state): State<AppState>,
    Path(partner_id): Path<Uuid>,
) -> AppResult<Json<PartnerEarnings>> {
    Ok(Json(
        state.reports.partner_earnings(&principal, partner_id).await?,
    ))
}
