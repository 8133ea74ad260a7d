use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-tenant accounting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitWindow {
    pub user_id: String,
    pub request_count: u32,
    pub window_start: DateTime<Utc>,
    pub is_limited: bool,
    pub daily_count: u32,
    pub day_start: DateTime<Utc>,
}

impl RateLimitWindow {
    pub fn open(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            request_count: 0,
            window_start: now,
            is_limited: false,
            daily_count: 0,
            day_start: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining_requests: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn denied(reset_time: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining_requests: 0,
            reset_time,
        }
    }
}
