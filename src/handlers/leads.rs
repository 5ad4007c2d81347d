// src/handlers/leads.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{
        AssignPartnerRequest, Lead, Project, ProposeCostRequest, SendOfferRequest,
        SubmitLeadRequest, SubmitLeadResponse, UpdateLeadStatusRequest,
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
pub struct ConvertedLeadResponse {
    pub lead: Lead,
    pub project: Project,
}

/// Submit a project brief (public intake)
#[utoipa::path(
    post,
    path = "/api/v1/leads/submit",
    request_body = SubmitLeadRequest,
    responses(
        (status = 201, description = "Lead submitted", body = SubmitLeadResponse),
        (status = 400, description = "Missing required fields"),
    ),
    tag = "Leads"
)]
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(body): Json<SubmitLeadRequest>,
) -> AppResult<(StatusCode, Json<SubmitLeadResponse>)> {
    let resp = state.leads.submit(body).await?;
    let status = if resp.lead_id.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(resp)))
}

/// List leads visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/leads",
    responses((status = 200, description = "Leads", body = Vec<Lead>)),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn list_leads(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Lead>>> {
    Ok(Json(state.leads.list(&principal).await?))
}

/// Get a single lead
#[utoipa::path(
    get,
    path = "/api/v1/leads/{lead_id}",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Lead detail", body = Lead),
        (status = 404, description = "Lead not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn get_lead(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> AppResult<Json<Lead>> {
    Ok(Json(state.leads.get(&principal, lead_id).await?))
}

/// Assign a partner to a lead (admin)
#[utoipa::path(
    put,
    path = "/api/v1/leads/{lead_id}/assign-partner",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    request_body = AssignPartnerRequest,
    responses(
        (status = 200, description = "Partner assigned", body = Lead),
        (status = 409, description = "Lead is past assignment"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn assign_partner(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<AssignPartnerRequest>,
) -> AppResult<Json<Lead>> {
    Ok(Json(
        state.leads.assign_partner(&principal, lead_id, body).await?,
    ))
}

/// Propose a delivery cost for an assigned lead (partner)
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/propose-cost",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    request_body = ProposeCostRequest,
    responses(
        (status = 200, description = "Cost proposed", body = Lead),
        (status = 403, description = "Not the assigned partner"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn propose_cost(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<ProposeCostRequest>,
) -> AppResult<Json<Lead>> {
    Ok(Json(
        state.leads.propose_cost(&principal, lead_id, body).await?,
    ))
}

/// Price and send the client offer (admin)
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/send-offer",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    request_body = SendOfferRequest,
    responses(
        (status = 200, description = "Offer sent", body = Lead),
        (status = 409, description = "No partner cost proposal yet"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn send_offer(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<SendOfferRequest>,
) -> AppResult<Json<Lead>> {
    Ok(Json(
        state.leads.send_offer(&principal, lead_id, body).await?,
    ))
}

/// Accept the offer and convert the lead into a project (client)
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/accept-offer",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 201, description = "Lead converted", body = ConvertedLeadResponse),
        (status = 409, description = "Offer is not open for acceptance"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn accept_offer(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<ConvertedLeadResponse>)> {
    let (lead, project) = state.leads.accept_offer(&principal, lead_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(ConvertedLeadResponse { lead, project }),
    ))
}

/// Reject the offer (client)
#[utoipa::path(
    post,
    path = "/api/v1/leads/{lead_id}/reject-offer",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 200, description = "Offer rejected", body = Lead),
        (status = 409, description = "No open offer"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn reject_offer(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> AppResult<Json<Lead>> {
    Ok(Json(state.leads.reject_offer(&principal, lead_id).await?))
}

/// Move a lead to REVIEWING or ARCHIVED (admin)
#[utoipa::path(
    put,
    path = "/api/v1/leads/{lead_id}/status",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    request_body = UpdateLeadStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Lead),
        (status = 409, description = "Illegal transition"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn update_lead_status(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
    Json(body): Json<UpdateLeadStatusRequest>,
) -> AppResult<Json<Lead>> {
    Ok(Json(
        state.leads.update_status(&principal, lead_id, body).await?,
    ))
}

/// Delete an unconverted lead (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/leads/{lead_id}",
    params(("lead_id" = Uuid, Path, description = "Lead ID")),
    responses(
        (status = 204, description = "Lead deleted"),
        (status = 409, description = "Lead already converted"),
    ),
    security(("bearer_auth" = [])),
    tag = "Leads"
)]
pub async fn delete_lead(
    principal: Principal,
    State(state): State<AppState>,
    Path(lead_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.leads.delete(&principal, lead_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
