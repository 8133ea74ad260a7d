//! Tenant registry and the quota gate in front of the shared content credential.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::db::{UserStore, WindowStore};
use crate::models::{RateLimitStatus, RateLimitWindow, Tier, UserProfile, UserStats};
use crate::rate_limit::QuotaLimiter;

static DATABASE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{32}$").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Invalid database ID format")]
    InvalidDatabaseId,
    #[error("User ID is required")]
    MissingUserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub category_db_id: String,
    pub content_db_id: String,
    #[serde(default)]
    pub tier: Tier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Updated,
}

impl Registration {
    pub fn message(self) -> &'static str {
        match self {
            Registration::Created => "User registered successfully",
            Registration::Updated => "User updated successfully",
        }
    }
}

/// Strip hyphens and check for exactly 32 hex characters.
pub fn normalize_database_id(id: &str) -> Option<String> {
    let stripped = id.replace('-', "");
    DATABASE_ID_RE.is_match(&stripped).then_some(stripped)
}

pub struct UserRegistry {
    users: Arc<dyn UserStore>,
    quota: QuotaLimiter,
}

impl UserRegistry {
    pub fn new(
        users: Arc<dyn UserStore>,
        windows: Arc<dyn WindowStore>,
        enforce_daily: bool,
    ) -> Self {
        Self {
            users,
            quota: QuotaLimiter::new(windows, enforce_daily),
        }
    }

    /// Create a tenant, or rebind an existing tenant's databases.
    pub fn register_user(&self, req: RegisterUser) -> Result<Registration, RegistryError> {
        if req.user_id.trim().is_empty() {
            return Err(RegistryError::MissingUserId);
        }
        let (Some(category_db_id), Some(content_db_id)) = (
            normalize_database_id(&req.category_db_id),
            normalize_database_id(&req.content_db_id),
        ) else {
            return Err(RegistryError::InvalidDatabaseId);
        };

        let now = Utc::now();
        let profile = UserProfile {
            user_id: req.user_id.clone(),
            email: req.email,
            registered_at: now,
            last_active: now,
            request_count: 0,
            category_db_id: category_db_id.clone(),
            content_db_id: content_db_id.clone(),
            is_active: true,
            tier: req.tier,
        };

        let existed = self.users.upsert(profile, &mut |existing| {
            existing.category_db_id = category_db_id.clone();
            existing.content_db_id = content_db_id.clone();
            existing.last_active = now;
        });

        let registration = if existed {
            Registration::Updated
        } else {
            Registration::Created
        };
        tracing::info!(user_id = %req.user_id, ?registration, "Tenant registered");
        Ok(registration)
    }

    pub fn get_user(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id)
    }

    pub fn can_make_request(&self, user_id: &str) -> RateLimitStatus {
        self.can_make_request_at(user_id, Utc::now())
    }

    /// Fails closed for unknown or deactivated tenants.
    pub fn can_make_request_at(&self, user_id: &str, now: DateTime<Utc>) -> RateLimitStatus {
        match self.active_user(user_id) {
            Some(user) => self.quota.check(user_id, user.tier.limits(), now),
            None => RateLimitStatus::denied(now),
        }
    }

    pub fn record_request(&self, user_id: &str) {
        self.record_request_at(user_id, Utc::now());
    }

    /// Not gated: callers check `can_make_request` first or use `try_acquire`.
    pub fn record_request_at(&self, user_id: &str, now: DateTime<Utc>) {
        if self.touch(user_id, now).is_some() {
            self.quota.record(user_id, now);
        }
    }

    pub fn try_acquire(&self, user_id: &str) -> RateLimitStatus {
        self.try_acquire_at(user_id, Utc::now())
    }

    /// Check and record as one step so concurrent requests from one tenant
    /// cannot overrun the ceiling.
    pub fn try_acquire_at(&self, user_id: &str, now: DateTime<Utc>) -> RateLimitStatus {
        let Some(user) = self.active_user(user_id) else {
            return RateLimitStatus::denied(now);
        };
        let status = self.quota.try_acquire(user_id, user.tier.limits(), now);
        if status.allowed {
            self.touch(user_id, now);
        } else {
            tracing::debug!(user_id, reset_time = %status.reset_time, "Quota exhausted");
        }
        status
    }

    pub fn window(&self, user_id: &str) -> Option<RateLimitWindow> {
        self.quota.window(user_id)
    }

    pub fn get_user_stats(&self, user_id: &str) -> Option<UserStats> {
        let user = self.users.get(user_id)?;
        let RateLimitStatus {
            remaining_requests, ..
        } = self.can_make_request(user_id);
        Some(UserStats {
            total_requests: user.request_count,
            last_active: user.last_active,
            tier: user.tier,
            remaining_requests,
        })
    }

    pub fn deactivate_user(&self, user_id: &str) -> bool {
        let deactivated = self
            .users
            .update(user_id, &mut |user| user.is_active = false)
            .is_some();
        if deactivated {
            tracing::info!(user_id, "Tenant deactivated");
        }
        deactivated
    }

    pub fn get_all_active_users(&self) -> Vec<UserProfile> {
        self.users.list().into_iter().filter(|u| u.is_active).collect()
    }

    pub fn cleanup_windows(&self, max_age: TimeDelta) {
        self.quota.cleanup(max_age, Utc::now());
    }

    fn active_user(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).filter(|u| u.is_active)
    }

    fn touch(&self, user_id: &str, now: DateTime<Utc>) -> Option<UserProfile> {
        self.users.update(user_id, &mut |user| {
            user.request_count += 1;
            user.last_active = now;
        })
    }
}
