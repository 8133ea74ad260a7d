//! Shared-credential access to tenant databases, gated by the registry quota.

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::{Value, json};
use thiserror::Error;

use crate::models::UserProfile;
use crate::notion::{NotionClient, NotionError};
use crate::registry::{
    RegisterUser, Registration, RegistryError, UserRegistry, normalize_database_id,
};

pub const CONTENT_PAGE_SIZE: u32 = 50;

const NAV_ACTIVE_PROPERTY: &str = "활성화";
const NAV_ORDER_PROPERTY: &str = "네비게이션 순서";
const CONTENT_ORDER_PROPERTY: &str = "노출 순서";
const CONTENT_CATEGORY_PROPERTY: &str = "페이지 카테고리";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database {database_id} is not accessible. Please share it with the integration.")]
    DatabaseNotAccessible { database_id: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("User not registered")]
    UserNotRegistered,
    #[error("User is deactivated")]
    UserInactive,
    #[error("Rate limit exceeded. Try again after {}", .reset_time.to_rfc3339())]
    RateLimited { reset_time: DateTime<Utc> },
    #[error("Content API request failed: {0}")]
    Upstream(#[from] NotionError),
}

/// Navigation entries: active rows only, in explicit navigation order.
pub fn navigation_query() -> Value {
    json!({
        "filter": {
            "property": NAV_ACTIVE_PROPERTY,
            "checkbox": { "equals": true },
        },
        "sorts": [
            { "property": NAV_ORDER_PROPERTY, "direction": "ascending" },
        ],
    })
}

/// Content entries in display order, optionally limited to one category.
pub fn content_query(category: Option<&str>) -> Value {
    let mut query = json!({
        "page_size": CONTENT_PAGE_SIZE,
        "sorts": [
            { "property": CONTENT_ORDER_PROPERTY, "direction": "ascending" },
        ],
    });
    if let Some(category) = category.filter(|c| !c.is_empty()) {
        query["filter"] = json!({
            "property": CONTENT_CATEGORY_PROPERTY,
            "relation": { "contains": category },
        });
    }
    query
}

pub struct CentralGateway {
    notion: NotionClient,
    token: String,
    registry: Arc<UserRegistry>,
    pacer: DefaultDirectRateLimiter,
}

impl CentralGateway {
    pub fn new(
        notion: NotionClient,
        token: String,
        registry: Arc<UserRegistry>,
        requests_per_second: u32,
    ) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            notion,
            token,
            registry,
            pacer: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    /// Validate both ids, confirm the shared credential can read them, then register.
    pub async fn register_user(&self, req: RegisterUser) -> Result<Registration, GatewayError> {
        let mut database_ids = Vec::with_capacity(2);
        for raw in [&req.category_db_id, &req.content_db_id] {
            database_ids.push(normalize_database_id(raw).ok_or(RegistryError::InvalidDatabaseId)?);
        }

        for database_id in database_ids {
            self.pacer.until_ready().await;
            if let Err(e) = self.notion.retrieve_database(&self.token, &database_id).await {
                tracing::warn!("Database {database_id} not accessible: {e}");
                return Err(GatewayError::DatabaseNotAccessible { database_id });
            }
        }
        Ok(self.registry.register_user(req)?)
    }

    pub async fn get_navigation_data(&self, user_id: &str) -> Result<Value, GatewayError> {
        let user = self.admit(user_id)?;
        self.query(&user.category_db_id, &navigation_query()).await
    }

    pub async fn get_content_data(
        &self,
        user_id: &str,
        category: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let user = self.admit(user_id)?;
        self.query(&user.content_db_id, &content_query(category)).await
    }

    /// Quota is counted before the upstream call; a failed call still costs one request.
    fn admit(&self, user_id: &str) -> Result<UserProfile, GatewayError> {
        let user = self
            .registry
            .get_user(user_id)
            .ok_or(GatewayError::UserNotRegistered)?;
        if !user.is_active {
            return Err(GatewayError::UserInactive);
        }
        let status = self.registry.try_acquire(user_id);
        if !status.allowed {
            return Err(GatewayError::RateLimited {
                reset_time: status.reset_time,
            });
        }
        Ok(user)
    }

    async fn query(&self, database_id: &str, body: &Value) -> Result<Value, GatewayError> {
        self.pacer.until_ready().await;
        Ok(self.notion.query_database(&self.token, database_id, body).await?)
    }
}
