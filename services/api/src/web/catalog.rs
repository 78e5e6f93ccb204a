//! services/api/src/web/catalog.rs
//!
//! Courses, groups, the teacher directory, rosters and course averages.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use schoolhub_core::directory::{NewCourse, NewGroup};
use schoolhub_core::{Course, CourseAverage, GroupView, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::AuthUser;
use crate::web::protocol::{ScheduleSlotBody, StudentSummaryResponse, UserResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub name: String,
    pub grade_label: String,
    pub section_label: String,
    pub year: i32,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub name: String,
    pub grade_label: String,
    pub section_label: String,
    pub year: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Course> for CourseResponse {
    fn from(c: Course) -> Self {
        Self {
            id: c.id,
            name: c.name,
            grade_label: c.grade_label,
            section_label: c.section_label,
            year: c.year,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlotBody>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    pub schedule: Vec<ScheduleSlotBody>,
}

/// A group with its course and teacher details resolved at read time.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct GroupResponse {
    pub id: Uuid,
    pub name: String,
    pub course_id: Uuid,
    pub course_name: Option<String>,
    pub teacher_id: Uuid,
    pub teacher_name: Option<String>,
    pub teacher_email: Option<String>,
    pub student_count: usize,
    pub schedule: Vec<ScheduleSlotBody>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GroupView> for GroupResponse {
    fn from(v: GroupView) -> Self {
        Self {
            id: v.group.id,
            name: v.group.name,
            course_id: v.group.course_id,
            course_name: v.course_name,
            teacher_id: v.group.teacher_id,
            teacher_name: v.teacher_name,
            teacher_email: v.teacher_email,
            student_count: v.student_count,
            schedule: v.group.schedule.into_iter().map(ScheduleSlotBody::from).collect(),
            created_at: v.group.created_at,
            updated_at: v.group.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CourseAverageResponse {
    pub course_id: Uuid,
    pub student_id: Uuid,
    pub graded_count: usize,
    /// Absent when the student has no graded work in the course.
    pub average: Option<f64>,
}

impl From<CourseAverage> for CourseAverageResponse {
    fn from(a: CourseAverage) -> Self {
        Self {
            course_id: a.course_id,
            student_id: a.student_id,
            graded_count: a.graded_count,
            average: a.average,
        }
    }
}

//=========================================================================================
// Courses
//=========================================================================================

/// GET /api/courses - All courses
#[utoipa::path(
    get,
    path = "/api/courses",
    tag = "catalog",
    responses((status = 200, description = "Courses ordered by name", body = [CourseResponse]))
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CourseResponse>>, ApiError> {
    let courses = state.directory.list_courses().await?;
    Ok(Json(courses.into_iter().map(CourseResponse::from).collect()))
}

/// POST /api/courses - Create a course
#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "catalog",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Admin])?;
    let course = state
        .directory
        .create_course(NewCourse {
            name: req.name,
            grade_label: req.grade_label,
            section_label: req.section_label,
            year: req.year,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from(course))))
}

/// GET /api/courses/{id}/roster - Students of every group of the course
#[utoipa::path(
    get,
    path = "/api/courses/{id}/roster",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "One entry per (group, student)", body = [StudentSummaryResponse]),
        (status = 404, description = "No such course", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn course_roster_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StudentSummaryResponse>>, ApiError> {
    caller.require(&[Role::Admin, Role::Teacher])?;
    let roster = state.roster.roster_for_course(id).await?;
    Ok(Json(roster.into_iter().map(StudentSummaryResponse::from).collect()))
}

/// GET /api/courses/{id}/students/{student_id}/average - A student's course average
#[utoipa::path(
    get,
    path = "/api/courses/{id}/students/{student_id}/average",
    tag = "catalog",
    params(
        ("id" = Uuid, Path, description = "Course id"),
        ("student_id" = Uuid, Path, description = "Student id")
    ),
    responses(
        (status = 200, description = "Mean of the graded submissions", body = CourseAverageResponse),
        (status = 403, description = "Students may only read their own average", body = ErrorResponse),
        (status = 404, description = "No such course", body = ErrorResponse)
    )
)]
pub async fn course_average_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path((id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CourseAverageResponse>, ApiError> {
    if caller.id != student_id {
        caller.require(&[Role::Admin, Role::Teacher])?;
    }
    let average = state.grades.course_average(id, student_id).await?;
    Ok(Json(average.into()))
}

//=========================================================================================
// Groups
//=========================================================================================

/// GET /api/groups - All groups with resolved details
#[utoipa::path(
    get,
    path = "/api/groups",
    tag = "catalog",
    responses(
        (status = 200, description = "Groups ordered by name", body = [GroupResponse]),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn list_groups_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    caller.require(&[Role::Admin])?;
    let views = state.directory.list_views().await?;
    Ok(Json(views.into_iter().map(GroupResponse::from).collect()))
}

/// POST /api/groups - Create a group
#[utoipa::path(
    post,
    path = "/api/groups",
    tag = "catalog",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = GroupResponse),
        (status = 400, description = "Invalid schedule or the user is not a teacher", body = ErrorResponse),
        (status = 404, description = "Course or teacher not found", body = ErrorResponse)
    )
)]
pub async fn create_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Admin])?;
    let view = state
        .directory
        .create_group(NewGroup {
            name: req.name,
            course_id: req.course_id,
            teacher_id: req.teacher_id,
            schedule: req.schedule.into_iter().map(Into::into).collect(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(GroupResponse::from(view))))
}

/// PUT /api/groups/{id} - Replace a group's weekly schedule
#[utoipa::path(
    put,
    path = "/api/groups/{id}",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Schedule replaced", body = GroupResponse),
        (status = 400, description = "Invalid schedule", body = ErrorResponse),
        (status = 404, description = "No such group", body = ErrorResponse)
    )
)]
pub async fn update_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    caller.require(&[Role::Admin])?;
    let view = state
        .directory
        .update_schedule(id, req.schedule.into_iter().map(Into::into).collect())
        .await?;
    Ok(Json(view.into()))
}

/// GET /api/groups/{id}/roster - Students actively enrolled in a group
#[utoipa::path(
    get,
    path = "/api/groups/{id}/roster",
    tag = "catalog",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Roster sorted by name", body = [StudentSummaryResponse]),
        (status = 404, description = "No such group", body = ErrorResponse)
    )
)]
pub async fn group_roster_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StudentSummaryResponse>>, ApiError> {
    caller.require(&[Role::Admin, Role::Teacher])?;
    let roster = state.roster.roster_for_group(id).await?;
    Ok(Json(roster.into_iter().map(StudentSummaryResponse::from).collect()))
}

/// GET /api/teachers - Approved teachers
#[utoipa::path(
    get,
    path = "/api/teachers",
    tag = "catalog",
    responses(
        (status = 200, description = "Active teachers", body = [UserResponse]),
        (status = 403, description = "Admins only", body = ErrorResponse)
    )
)]
pub async fn list_teachers_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    caller.require(&[Role::Admin])?;
    let teachers = state.directory.active_teachers().await?;
    Ok(Json(teachers.into_iter().map(UserResponse::from).collect()))
}

