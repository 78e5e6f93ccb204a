//! services/api/src/web/coursework.rs
//!
//! Tasks, student submissions and grading.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use schoolhub_core::coursework::{NewTask, SubmissionInput, SubmissionView, TaskPatch, TaskQuery};
use schoolhub_core::{PortError, RawTimestamp, Role, ScopeFilter, TaskStatus, TaskView};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::AuthUser;
use crate::web::protocol::{FileBody, SubmissionResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    /// RFC 3339 string, naive ISO string (read as UTC) or `{"seconds", "nanoseconds"}`.
    #[schema(value_type = String)]
    pub deadline: Option<RawTimestamp>,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub deadline: Option<RawTimestamp>,
}

#[derive(Deserialize, IntoParams)]
pub struct TaskListQuery {
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    /// `active` or `expired`.
    pub status: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
    /// Derived from the deadline when the task was read.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskView> for TaskResponse {
    fn from(v: TaskView) -> Self {
        Self {
            id: v.task.id,
            course_id: v.task.course_id,
            group_id: v.task.group_id,
            teacher_id: v.task.teacher_id,
            title: v.task.title,
            description: v.task.description,
            deadline: v.task.deadline,
            status: v.status.as_str().to_string(),
            created_at: v.task.created_at,
            updated_at: v.task.updated_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitRequest {
    pub file: Option<FileBody>,
    pub link: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SubmitResponse {
    pub submission: SubmissionResponse,
    /// False when an earlier submission was overwritten.
    pub created: bool,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct TaskSubmissionResponse {
    pub submission: SubmissionResponse,
    pub student_name: String,
    pub student_email: String,
}

impl From<SubmissionView> for TaskSubmissionResponse {
    fn from(v: SubmissionView) -> Self {
        Self {
            submission: v.submission.into(),
            student_name: v.student_name,
            student_email: v.student_email,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct GradeRequest {
    /// Between 0 and 100 inclusive.
    pub grade: f64,
    pub comment: Option<String>,
}

fn parse_status(raw: &str) -> Result<TaskStatus, PortError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "active" => Ok(TaskStatus::Active),
        "expired" => Ok(TaskStatus::Expired),
        other => Err(PortError::InvalidInput(format!("Unknown task status '{}'", other))),
    }
}

//=========================================================================================
// Tasks
//=========================================================================================

/// GET /api/tasks - Tasks in scope with their derived status
#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "coursework",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Earliest deadline first; tasks without a deadline last", body = [TaskResponse]),
        (status = 400, description = "Unknown status", body = ErrorResponse)
    )
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let tasks = state
        .coursework
        .list_tasks(TaskQuery {
            scope: ScopeFilter {
                course_id: query.course_id,
                group_id: query.group_id,
            },
            status,
        })
        .await?;
    Ok(Json(tasks.into_iter().map(TaskResponse::from).collect()))
}

/// POST /api/tasks - Create a task
#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "coursework",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Missing title, description or deadline", body = ErrorResponse),
        (status = 403, description = "Teachers only", body = ErrorResponse)
    )
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Teacher])?;
    let view = state
        .coursework
        .create_task(
            caller.id,
            NewTask {
                title: req.title,
                description: req.description,
                deadline: req.deadline,
                course_id: req.course_id,
                group_id: req.group_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(view))))
}

/// PUT /api/tasks/{id} - Edit a task
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    let view = state
        .coursework
        .update_task(
            caller.actor(),
            id,
            TaskPatch {
                title: req.title,
                description: req.description,
                deadline: req.deadline,
            },
        )
        .await?;
    Ok(Json(view.into()))
}

/// DELETE /api/tasks/{id} - Delete a task and its submissions
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    state.coursework.delete_task(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Submissions
//=========================================================================================

/// POST /api/tasks/{id}/submissions - Submit or resubmit work for a task
#[utoipa::path(
    post,
    path = "/api/tasks/{id}/submissions",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "First submission stored", body = SubmitResponse),
        (status = 200, description = "Earlier submission overwritten; its grade is kept", body = SubmitResponse),
        (status = 400, description = "No file or link, or the deadline has passed", body = ErrorResponse),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Student])?;
    let receipt = state
        .coursework
        .submit(
            caller.id,
            id,
            SubmissionInput {
                file: req.file.map(Into::into),
                link: req.link,
            },
        )
        .await?;

    let status = if receipt.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let body = SubmitResponse {
        submission: receipt.submission.into(),
        created: receipt.created,
    };
    Ok((status, Json(body)))
}

/// GET /api/tasks/{id}/submissions - All submissions for a task
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/submissions",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Submissions with the student's name and email", body = [TaskSubmissionResponse]),
        (status = 404, description = "No such task", body = ErrorResponse)
    )
)]
pub async fn task_submissions_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TaskSubmissionResponse>>, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    let views = state.coursework.submissions_for_task(id).await?;
    Ok(Json(views.into_iter().map(TaskSubmissionResponse::from).collect()))
}

/// GET /api/tasks/{id}/my-submission - The caller's submission, or null
#[utoipa::path(
    get,
    path = "/api/tasks/{id}/my-submission",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "The caller's submission, or null when there is none", body = SubmissionResponse)
    )
)]
pub async fn my_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Option<SubmissionResponse>>, ApiError> {
    caller.require(&[Role::Student])?;
    let submission = state.coursework.my_submission(caller.id, id).await?;
    Ok(Json(submission.map(SubmissionResponse::from)))
}

/// PUT /api/submissions/{id}/grade - Grade a submission
#[utoipa::path(
    put,
    path = "/api/submissions/{id}/grade",
    tag = "coursework",
    params(("id" = Uuid, Path, description = "Submission id")),
    request_body = GradeRequest,
    responses(
        (status = 200, description = "Grade recorded", body = SubmissionResponse),
        (status = 400, description = "Grade outside 0..=100", body = ErrorResponse),
        (status = 403, description = "Not the owner of the task", body = ErrorResponse),
        (status = 404, description = "No such submission", body = ErrorResponse)
    )
)]
pub async fn grade_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<GradeRequest>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    let graded = state
        .coursework
        .grade(caller.actor(), id, req.grade, req.comment)
        .await?;
    Ok(Json(graded.into()))
}
