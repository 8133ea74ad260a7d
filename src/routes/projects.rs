use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::extractor::AdminAuth;
use crate::error::AppError;
use crate::models::{Project, ProjectStatus, ProjectUpdate};
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub status: ProjectStatus,
    #[serde(flatten)]
    pub fields: ProjectUpdate,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBuild {
    pub project_id: Option<String>,
}

pub async fn get(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, AppError> {
    let project = state
        .lifecycle
        .get_user_project(&id)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    Ok(Json(project))
}

pub async fn update(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatus>,
) -> Result<Json<Value>, AppError> {
    let project = state
        .lifecycle
        .update_project_status(&id, req.status, req.fields)?;

    Ok(Json(json!({
        "id": project.id,
        "status": project.status,
        "updatedAt": project.updated_at,
        "siteUrl": project.site_url,
        "repoUrl": project.repo_url,
        "error": project.error,
    })))
}

pub async fn check_access(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let project = state
        .lifecycle
        .get_user_project(&id)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    let accessible = state.lifecycle.test_database_access(&project).await;
    Ok(Json(json!({ "id": project.id, "accessible": accessible })))
}

pub async fn create_build(
    State(state): State<SharedState>,
    Json(req): Json<CreateBuild>,
) -> Result<Json<Value>, AppError> {
    let project_id = req
        .project_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Project ID is required".to_string()))?;

    let builds = state
        .builds
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Repository provisioning is not configured".to_string()))?;

    let started = builds.start_build(&project_id).await?;

    Ok(Json(json!({
        "success": true,
        "projectId": started.project_id,
        "repository": {
            "name": started.repository.name,
            "url": started.repository.html_url,
            "cloneUrl": started.repository.clone_url,
        },
        "status": ProjectStatus::WebsiteBuilding,
        "message": "Website build started successfully",
    })))
}
