//! services/api/src/web/rest.rs
//!
//! The health check and the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::{auth, catalog, coursework, enrollments, materials, users};
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::session_handler,
        auth::logout_handler,
        users::get_profile_handler,
        users::update_profile_handler,
        users::list_users_handler,
        users::set_role_handler,
        users::approve_user_handler,
        users::reject_user_handler,
        users::delete_user_handler,
        catalog::list_courses_handler,
        catalog::create_course_handler,
        catalog::course_roster_handler,
        catalog::course_average_handler,
        catalog::list_groups_handler,
        catalog::create_group_handler,
        catalog::update_group_handler,
        catalog::group_roster_handler,
        catalog::list_teachers_handler,
        enrollments::list_enrollments_handler,
        enrollments::enroll_handler,
        enrollments::withdraw_handler,
        coursework::list_tasks_handler,
        coursework::create_task_handler,
        coursework::update_task_handler,
        coursework::delete_task_handler,
        coursework::submit_handler,
        coursework::task_submissions_handler,
        coursework::my_submission_handler,
        coursework::grade_handler,
        materials::list_materials_handler,
        materials::create_material_handler,
        materials::update_material_handler,
        materials::delete_material_handler,
    ),
    components(
        schemas(HealthResponse, crate::error::ErrorResponse)
    ),
    tags(
        (name = "auth", description = "Local accounts and browser sessions."),
        (name = "users", description = "Profiles and account administration."),
        (name = "catalog", description = "Courses, groups, rosters and averages."),
        (name = "enrollments", description = "Student membership in groups."),
        (name = "coursework", description = "Tasks, submissions and grading."),
        (name = "materials", description = "Teaching materials.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub time: DateTime<Utc>,
}

/// GET /healthz - Liveness check
#[utoipa::path(
    get,
    path = "/healthz",
    responses((status = 200, description = "The server is up", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        time: state.clock.now(),
    })
}
