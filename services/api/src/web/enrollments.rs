//! services/api/src/web/enrollments.rs
//!
//! Enrolling students in groups and withdrawing them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use schoolhub_core::{Enrollment, EnrollmentFilter, EnrollmentStatus, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct EnrollRequest {
    pub group_id: Uuid,
    pub student_id: Uuid,
}

#[derive(Deserialize, IntoParams)]
pub struct EnrollmentQuery {
    pub group_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    /// `active` (default) or `withdrawn`.
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub group_id: Uuid,
    pub student_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Enrollment> for EnrollmentResponse {
    fn from(e: Enrollment) -> Self {
        Self {
            id: e.id,
            group_id: e.group_id,
            student_id: e.student_id,
            status: e.status.as_str().to_string(),
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}

/// GET /api/enrollments - Enrollments matching the filters
#[utoipa::path(
    get,
    path = "/api/enrollments",
    tag = "enrollments",
    params(EnrollmentQuery),
    responses(
        (status = 200, description = "Matching enrollments, oldest first", body = [EnrollmentResponse]),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn list_enrollments_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Query(query): Query<EnrollmentQuery>,
) -> Result<Json<Vec<EnrollmentResponse>>, ApiError> {
    caller.require(&[Role::Admin])?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<EnrollmentStatus>)
        .transpose()?;
    let enrollments = state
        .enrollments
        .list(EnrollmentFilter {
            group_id: query.group_id,
            student_id: query.student_id,
            status,
        })
        .await?;
    Ok(Json(enrollments.into_iter().map(EnrollmentResponse::from).collect()))
}

/// POST /api/enrollments - Enroll a student in a group
#[utoipa::path(
    post,
    path = "/api/enrollments",
    tag = "enrollments",
    request_body = EnrollRequest,
    responses(
        (status = 201, description = "Student enrolled", body = EnrollmentResponse),
        (status = 400, description = "The user is not a student", body = ErrorResponse),
        (status = 404, description = "Group or student not found", body = ErrorResponse),
        (status = 409, description = "Already actively enrolled", body = ErrorResponse)
    )
)]
pub async fn enroll_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<EnrollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Admin])?;
    let enrollment = state.enrollments.enroll(req.group_id, req.student_id).await?;
    Ok((StatusCode::CREATED, Json(EnrollmentResponse::from(enrollment))))
}

/// DELETE /api/enrollments/{id} - Withdraw an enrollment
///
/// The record is kept with status `withdrawn`.
#[utoipa::path(
    delete,
    path = "/api/enrollments/{id}",
    tag = "enrollments",
    params(("id" = Uuid, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment withdrawn", body = EnrollmentResponse),
        (status = 404, description = "No such enrollment", body = ErrorResponse),
        (status = 409, description = "Already withdrawn", body = ErrorResponse)
    )
)]
pub async fn withdraw_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let enrollment = state.enrollments.withdraw(id).await?;
    Ok(Json(enrollment.into()))
}
