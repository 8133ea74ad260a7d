use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::extractor::AdminAuth;
use crate::error::AppError;
use crate::github::Provisioner;
use crate::models::{Project, RepositoryInfo, RepositoryVisibility, UserProfile, UserStats};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ListRepositories {
    #[serde(default, rename = "type")]
    pub visibility: RepositoryVisibility,
}

fn provisioner(state: &SharedState) -> Result<&Arc<Provisioner>, AppError> {
    state
        .provisioner
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Repository provisioning is not configured".to_string()))
}

pub async fn list_users(
    _admin: AdminAuth,
    State(state): State<SharedState>,
) -> Json<Vec<UserProfile>> {
    Json(state.registry.get_all_active_users())
}

pub async fn user_stats(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<UserStats>, AppError> {
    state
        .registry
        .get_user_stats(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn deactivate_user(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !state.registry.deactivate_user(&id) {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    Ok(Json(json!({ "message": "Deactivated" })))
}

pub async fn list_projects(
    _admin: AdminAuth,
    State(state): State<SharedState>,
) -> Json<Vec<Project>> {
    Json(state.lifecycle.get_all_projects())
}

pub async fn list_repositories(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Query(query): Query<ListRepositories>,
) -> Result<Json<Vec<RepositoryInfo>>, AppError> {
    let repos = provisioner(&state)?
        .list_repositories(query.visibility)
        .await?;
    Ok(Json(repos))
}

pub async fn get_repository(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepositoryInfo>, AppError> {
    let repository = provisioner(&state)?.get_repository(&owner, &repo).await?;
    Ok(Json(repository))
}

pub async fn delete_repository(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    provisioner(&state)?.delete_repository(&owner, &repo).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

pub async fn trigger_workflow(
    _admin: AdminAuth,
    State(state): State<SharedState>,
    Path((owner, repo, workflow_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, AppError> {
    provisioner(&state)?
        .trigger_workflow(&owner, &repo, &workflow_id)
        .await?;
    Ok(Json(json!({ "message": "Workflow dispatched" })))
}
