//! services/api/src/web/users.rs
//!
//! Profile endpoints for the caller and account administration for admins.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use schoolhub_core::Role;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::AuthUser;
use crate::web::protocol::{ProfileBody, UserResponse};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct RoleRequest {
    /// One of STUDENT, TEACHER, ADMIN.
    pub role: String,
}

/// GET /api/me/profile - The caller's account and profile
#[utoipa::path(
    get,
    path = "/api/me/profile",
    tag = "users",
    responses(
        (status = 200, description = "The caller's account", body = UserResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.accounts.profile(caller.id).await?;
    Ok(Json(user.into()))
}

/// PUT /api/me/profile - Replace the caller's profile
#[utoipa::path(
    put,
    path = "/api/me/profile",
    tag = "users",
    request_body = ProfileBody,
    responses(
        (status = 200, description = "Profile saved and marked complete", body = UserResponse),
        (status = 400, description = "Names or document number missing", body = ErrorResponse)
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(body): Json<ProfileBody>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.accounts.update_profile(caller.id, body.into()).await?;
    Ok(Json(user.into()))
}

/// GET /api/users - All accounts
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All accounts ordered by email", body = [UserResponse]),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    caller.require(&[Role::Admin])?;
    let users = state.accounts.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /api/users/{id}/role - Change an account's role
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 400, description = "Unknown role", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn set_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let role = body.role.parse::<Role>()?;
    let user = state.accounts.set_role(id, role).await?;
    Ok(Json(user.into()))
}

/// PUT /api/users/{id}/approve - Activate a pending account with a role
#[utoipa::path(
    put,
    path = "/api/users/{id}/approve",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = RoleRequest,
    responses(
        (status = 200, description = "Account approved", body = UserResponse),
        (status = 400, description = "Unknown or unassignable role", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn approve_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let role = body.role.parse::<Role>()?;
    let user = state.accounts.approve(id, role).await?;
    Ok(Json(user.into()))
}

/// PUT /api/users/{id}/reject - Reject an account
#[utoipa::path(
    put,
    path = "/api/users/{id}/reject",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Account rejected", body = UserResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn reject_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let user = state.accounts.reject(id).await?;
    Ok(Json(user.into()))
}

/// DELETE /api/users/{id} - Delete an account with its sessions
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 400, description = "Admins cannot delete themselves", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    )
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require(&[Role::Admin])?;
    state.accounts.delete_user(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
