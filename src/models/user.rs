use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
}

impl Tier {
    pub fn limits(self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                requests_per_hour: 100,
                requests_per_day: 1_000,
            },
            Tier::Premium => TierLimits {
                requests_per_hour: 500,
                requests_per_day: 5_000,
            },
            Tier::Enterprise => TierLimits {
                requests_per_hour: 2_000,
                requests_per_day: 20_000,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub request_count: u64,
    pub category_db_id: String,
    pub content_db_id: String,
    pub is_active: bool,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_requests: u64,
    pub last_active: DateTime<Utc>,
    pub tier: Tier,
    pub remaining_requests: u32,
}
