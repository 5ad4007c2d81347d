// src/handlers/projects.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{
        CreateProjectRequest, Milestone, Project, RecomputeProjectRequest,
        UpdateProjectStatusRequest,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

/// Create a project manually (admin)
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 409, description = "Lead already converted"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn create_project(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<CreateProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    let project = state.projects.create(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// List projects visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    responses((status = 200, description = "Projects", body = Vec<Project>)),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_projects(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list(&principal).await?))
}

/// Get a single project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project detail", body = Project),
        (status = 404, description = "Project not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn get_project(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.projects.get(&principal, project_id).await?))
}

/// List a project's milestones
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/milestones",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses((status = 200, description = "Milestones", body = Vec<Milestone>)),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn list_project_milestones(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Vec<Milestone>>> {
    Ok(Json(
        state
            .milestones
            .list_for_project(&principal, project_id)
            .await?,
    ))
}

/// Recompute a project's money fields (admin)
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/recompute",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = RecomputeProjectRequest,
    responses(
        (status = 200, description = "Project repriced", body = Project),
        (status = 409, description = "Project already completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn recompute_project(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<RecomputeProjectRequest>,
) -> AppResult<Json<Project>> {
    Ok(Json(
        state.projects.recompute(&principal, project_id, body).await?,
    ))
}

/// Mark a project complete, realizing the margin as revenue (admin)
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/complete",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project completed", body = Project),
        (status = 409, description = "Already completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn complete_project(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    Ok(Json(
        state.projects.mark_complete(&principal, project_id).await?,
    ))
}

/// Cancel a project (admin)
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/cancel",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project cancelled", body = Project),
        (status = 409, description = "Already completed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn cancel_project(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.projects.cancel(&principal, project_id).await?))
}

/// Update project delivery status (partner)
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/status",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    request_body = UpdateProjectStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Project),
        (status = 403, description = "Not the project's partner"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn update_project_status(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Json(body): Json<UpdateProjectStatusRequest>,
) -> AppResult<Json<Project>> {
    Ok(Json(
        state
            .projects
            .update_status(&principal, project_id, body.status)
            .await?,
    ))
}

/// Delete a project, breaking the lead linkage first (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}",
    params(("project_id" = Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 409, description = "Milestones still reference this project"),
    ),
    security(("bearer_auth" = [])),
    tag = "Projects"
)]
pub async fn delete_project(
    principal: Principal,
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.projects.delete(&principal, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
