// src/handlers/auth.rs

use crate::{
    auth::Principal,
    errors::AppResult,
    models::{
        AuthResponse, CreatePartnerRequest, LoginRequest, Partner, PrincipalInfo,
        SetPasswordRequest,
    },
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};

/// Login with email, password and role
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(state.accounts.login(body).await?))
}

/// Set a password via the emailed activation token
#[utoipa::path(
    post,
    path = "/api/v1/auth/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Account activated", body = AuthResponse),
        (status = 404, description = "Invalid or expired token"),
    ),
    tag = "Auth"
)]
pub async fn set_password(
    State(state): State<AppState>,
    Json(body): Json<SetPasswordRequest>,
) -> AppResult<Json<AuthResponse>> {
    Ok(Json(state.accounts.set_password(body).await?))
}

/// Get the authenticated principal's profile
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current principal", body = PrincipalInfo),
        (status = 401, description = "Unauthorized"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    principal: Principal,
    State(state): State<AppState>,
) -> AppResult<Json<PrincipalInfo>> {
    Ok(Json(state.accounts.me(&principal).await?))
}

/// Onboard a partner (admin only)
#[utoipa::path(
    post,
    path = "/api/v1/partners",
    request_body = CreatePartnerRequest,
    responses(
        (status = 201, description = "Partner created", body = Partner),
        (status = 409, description = "Email already exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn create_partner(
    principal: Principal,
    State(state): State<AppState>,
    Json(body): Json<CreatePartnerRequest>,
) -> AppResult<(StatusCode, Json<Partner>)> {
    let partner = state.accounts.create_partner(&principal, body).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}
