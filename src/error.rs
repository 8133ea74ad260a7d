use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::deploy::BuildError;
use crate::gateway::GatewayError;
use crate::github::ProvisionError;
use crate::lifecycle::LifecycleError;
use crate::registry::RegistryError;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Conflict(String),
    RateLimited {
        message: String,
        reset_time: DateTime<Utc>,
    },
    Upstream(String),
    Unavailable(String),
    Internal(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not Found: {msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::RateLimited { message, .. } => write!(f, "Rate Limited: {message}"),
            AppError::Upstream(msg) => write!(f, "Upstream Error: {msg}"),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited { message, .. } => (StatusCode::TOO_MANY_REQUESTS, message.clone()),
            AppError::Upstream(msg) => {
                tracing::warn!("Upstream error: {msg}");
                (StatusCode::BAD_GATEWAY, msg.clone())
            }
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = json!({ "error": message });
        let mut response = (status, axum::Json(body)).into_response();

        if let AppError::RateLimited { reset_time, .. } = &self {
            let retry_after = (*reset_time - Utc::now()).num_seconds().max(0);
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::DatabaseNotAccessible { .. } => AppError::BadRequest(err.to_string()),
            GatewayError::Registry(e) => e.into(),
            GatewayError::UserNotRegistered => AppError::NotFound(err.to_string()),
            GatewayError::UserInactive => AppError::Forbidden(err.to_string()),
            GatewayError::RateLimited { reset_time } => AppError::RateLimited {
                message: err.to_string(),
                reset_time,
            },
            GatewayError::Upstream(_) => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::NotFound(_) => AppError::NotFound("Project not found".to_string()),
            LifecycleError::TokenExchangeFailed(_) | LifecycleError::ExtractionFailed { .. } => {
                AppError::Upstream(err.to_string())
            }
            LifecycleError::NotReady { .. } | LifecycleError::InvalidTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            LifecycleError::MissingTemplate
            | LifecycleError::MissingSiteUrl
            | LifecycleError::MissingDatabaseIds => AppError::BadRequest(err.to_string()),
            LifecycleError::Credential(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<ProvisionError> for AppError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::RepositoryNotFound { .. } => AppError::NotFound(err.to_string()),
            _ => AppError::Upstream(err.to_string()),
        }
    }
}

impl From<BuildError> for AppError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Lifecycle(e) => e.into(),
            BuildError::Provision(e) => e.into(),
        }
    }
}
