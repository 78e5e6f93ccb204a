//! services/api/src/web/materials.rs
//!
//! Teaching materials.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use schoolhub_core::materials::{MaterialPatch, NewMaterial};
use schoolhub_core::{Material, Role, ScopeFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::web::middleware::AuthUser;
use crate::web::protocol::FileBody;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct CreateMaterialRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub file: Option<FileBody>,
    pub link: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file: Option<FileBody>,
    /// An empty string removes the link.
    pub link: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct MaterialQuery {
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct MaterialResponse {
    pub id: Uuid,
    pub course_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub teacher_id: Uuid,
    pub title: String,
    pub description: String,
    pub file: Option<FileBody>,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Material> for MaterialResponse {
    fn from(m: Material) -> Self {
        Self {
            id: m.id,
            course_id: m.course_id,
            group_id: m.group_id,
            teacher_id: m.teacher_id,
            title: m.title,
            description: m.description,
            file: m.file.map(FileBody::from),
            link: m.link,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// GET /api/materials - Materials in scope
#[utoipa::path(
    get,
    path = "/api/materials",
    tag = "materials",
    params(MaterialQuery),
    responses((status = 200, description = "Newest first", body = [MaterialResponse]))
)]
pub async fn list_materials_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MaterialQuery>,
) -> Result<Json<Vec<MaterialResponse>>, ApiError> {
    let materials = state
        .materials
        .list(ScopeFilter {
            course_id: query.course_id,
            group_id: query.group_id,
        })
        .await?;
    Ok(Json(materials.into_iter().map(MaterialResponse::from).collect()))
}

/// POST /api/materials - Publish a material
#[utoipa::path(
    post,
    path = "/api/materials",
    tag = "materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material published", body = MaterialResponse),
        (status = 400, description = "Missing title, or neither file nor link", body = ErrorResponse),
        (status = 403, description = "Teachers only", body = ErrorResponse)
    )
)]
pub async fn create_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Json(req): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    caller.require(&[Role::Teacher])?;
    let material = state
        .materials
        .create(
            caller.id,
            NewMaterial {
                title: req.title,
                description: req.description,
                course_id: req.course_id,
                group_id: req.group_id,
                file: req.file.map(Into::into),
                link: req.link,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(MaterialResponse::from(material))))
}

/// PUT /api/materials/{id} - Edit a material
#[utoipa::path(
    put,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = Uuid, Path, description = "Material id")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = MaterialResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such material", body = ErrorResponse)
    )
)]
pub async fn update_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMaterialRequest>,
) -> Result<Json<MaterialResponse>, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    let material = state
        .materials
        .update(
            caller.actor(),
            id,
            MaterialPatch {
                title: req.title,
                description: req.description,
                file: req.file.map(Into::into),
                link: req.link,
            },
        )
        .await?;
    Ok(Json(material.into()))
}

/// DELETE /api/materials/{id} - Delete a material
#[utoipa::path(
    delete,
    path = "/api/materials/{id}",
    tag = "materials",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such material", body = ErrorResponse)
    )
)]
pub async fn delete_material_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require(&[Role::Teacher, Role::Admin])?;
    state.materials.delete(caller.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
