// src/handlers/milestones.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{
        ApproveMilestoneRequest, Invoice, Milestone, RejectMilestoneRequest,
        SubmitMilestoneRequest, UpdateMilestoneStatusRequest,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovedMilestoneResponse {
    pub milestone: Milestone,
    pub invoice: Invoice,
}

/// Submit a milestone for an assigned project (partner)
#[utoipa::path(
    post,
    path = "/api/v1/milestones",
    request_body = SubmitMilestoneRequest,
    responses(
        (status = 201, description = "Milestone submitted", body = Milestone),
        (status = 403, description = "Not the project's partner"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn submit_milestone(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<SubmitMilestoneRequest>,
) -> AppResult<(StatusCode, Json<Milestone>)> {
    let milestone = state.milestones.submit(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(milestone)))
}

/// List milestones visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/milestones",
    responses((status = 200, description = "Milestones", body = Vec<Milestone>)),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn list_milestones(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Milestone>>> {
    Ok(Json(state.milestones.list(&principal).await?))
}

/// Get a single milestone
#[utoipa::path(
    get,
    path = "/api/v1/milestones/{milestone_id}",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 200, description = "Milestone detail", body = Milestone),
        (status = 404, description = "Milestone not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn get_milestone(
    principal: Principal,
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
) -> AppResult<Json<Milestone>> {
    Ok(Json(state.milestones.get(&principal, milestone_id).await?))
}

/// Approve a pending milestone and issue its invoice (admin)
#[utoipa::path(
    put,
    path = "/api/v1/milestones/{milestone_id}/approve",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    request_body = ApproveMilestoneRequest,
    responses(
        (status = 200, description = "Milestone approved and invoiced", body = ApprovedMilestoneResponse),
        (status = 409, description = "Milestone is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn approve_milestone(
    principal: Principal,
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
    Json(body): Json<ApproveMilestoneRequest>,
) -> AppResult<Json<ApprovedMilestoneResponse>> {
    let (milestone, invoice) = state
        .milestones
        .approve(&principal, milestone_id, body)
        .await?;
    Ok(Json(ApprovedMilestoneResponse { milestone, invoice }))
}

/// Reject a pending milestone (admin)
#[utoipa::path(
    put,
    path = "/api/v1/milestones/{milestone_id}/reject",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    request_body = RejectMilestoneRequest,
    responses(
        (status = 200, description = "Milestone rejected", body = Milestone),
        (status = 409, description = "Milestone is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn reject_milestone(
    principal: Principal,
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
    Json(body): Json<RejectMilestoneRequest>,
) -> AppResult<Json<Milestone>> {
    Ok(Json(
        state.milestones.reject(&principal, milestone_id, body).await?,
    ))
}

/// Update milestone delivery status (partner)
#[utoipa::path(
    put,
    path = "/api/v1/milestones/{milestone_id}/status",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    request_body = UpdateMilestoneStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Milestone),
        (status = 409, description = "Milestone already paid"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn update_milestone_status(
    principal: Principal,
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
    Json(body): Json<UpdateMilestoneStatusRequest>,
) -> AppResult<Json<Milestone>> {
    Ok(Json(
        state
            .milestones
            .update_status(&principal, milestone_id, body.status)
            .await?,
    ))
}

/// Delete a milestone without financial history (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/milestones/{milestone_id}",
    params(("milestone_id" = Uuid, Path, description = "Milestone ID")),
    responses(
        (status = 204, description = "Milestone deleted"),
        (status = 409, description = "Invoices or payments reference this milestone"),
    ),
    security(("bearer_auth" = [])),
    tag = "Milestones"
)]
pub async fn delete_milestone(
    principal: Principal,
    State(state): State<AppState>,
    Path(milestone_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.milestones.delete(&principal, milestone_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
