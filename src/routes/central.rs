use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::gateway::CentralGateway;
use crate::registry::RegisterUser;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantQuery {
    pub user_id: Option<String>,
    pub category: Option<String>,
}

fn gateway(state: &SharedState) -> Result<&CentralGateway, AppError> {
    state
        .gateway
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Central integration is not configured".to_string()))
}

/// Tenant id from `?userId=` or the `x-user-id` header.
fn tenant_id(query: &TenantQuery, headers: &HeaderMap) -> Result<String, AppError> {
    query
        .user_id
        .clone()
        .or_else(|| {
            headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterUser>,
) -> Result<Json<Value>, AppError> {
    let registration = gateway(&state)?.register_user(req).await?;
    Ok(Json(json!({
        "success": true,
        "message": registration.message(),
    })))
}

pub async fn navigation(
    State(state): State<SharedState>,
    Query(query): Query<TenantQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let user_id = tenant_id(&query, &headers)?;
    let data = gateway(&state)?.get_navigation_data(&user_id).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

pub async fn gallery(
    State(state): State<SharedState>,
    Query(query): Query<TenantQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let user_id = tenant_id(&query, &headers)?;
    let data = gateway(&state)?
        .get_content_data(&user_id, query.category.as_deref())
        .await?;
    Ok(Json(json!({ "success": true, "data": data })))
}
