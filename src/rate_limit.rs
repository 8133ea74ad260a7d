use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use crate::db::WindowStore;
use crate::models::{RateLimitStatus, RateLimitWindow, TierLimits};

pub const HOURLY_WINDOW: TimeDelta = TimeDelta::hours(1);
pub const DAILY_WINDOW: TimeDelta = TimeDelta::hours(24);

/// Per-tenant rolling quota. Hourly ceilings are always enforced; daily
/// ceilings only when `enforce_daily` is set.
pub struct QuotaLimiter {
    windows: Arc<dyn WindowStore>,
    enforce_daily: bool,
}

impl QuotaLimiter {
    pub fn new(windows: Arc<dyn WindowStore>, enforce_daily: bool) -> Self {
        Self {
            windows,
            enforce_daily,
        }
    }

    /// Report whether the tenant may issue another request. Opens (and
    /// persists) a fresh window when the previous one has expired.
    pub fn check(&self, user_id: &str, limits: TierLimits, now: DateTime<Utc>) -> RateLimitStatus {
        let mut status = RateLimitStatus::denied(now);
        self.windows
            .modify(user_id, RateLimitWindow::open(user_id, now), &mut |window| {
                roll(window, now);
                status = self.status(window, limits);
                window.is_limited = !status.allowed;
            });
        status
    }

    /// Count one request against the tenant's window without checking it.
    pub fn record(&self, user_id: &str, now: DateTime<Utc>) {
        self.windows
            .modify(user_id, RateLimitWindow::open(user_id, now), &mut |window| {
                roll(window, now);
                window.request_count = window.request_count.saturating_add(1);
                window.daily_count = window.daily_count.saturating_add(1);
            });
    }

    /// Check and count in one step under the tenant's window lock. The
    /// returned `remaining_requests` already accounts for this request.
    pub fn try_acquire(
        &self,
        user_id: &str,
        limits: TierLimits,
        now: DateTime<Utc>,
    ) -> RateLimitStatus {
        let mut status = RateLimitStatus::denied(now);
        self.windows
            .modify(user_id, RateLimitWindow::open(user_id, now), &mut |window| {
                roll(window, now);
                let before = self.status(window, limits);
                if !before.allowed {
                    window.is_limited = true;
                    status = before;
                    return;
                }
                window.request_count += 1;
                window.daily_count += 1;
                let after = self.status(window, limits);
                window.is_limited = !after.allowed;
                status = RateLimitStatus {
                    allowed: true,
                    remaining_requests: after.remaining_requests,
                    reset_time: after.reset_time,
                };
            });
        status
    }

    pub fn window(&self, user_id: &str) -> Option<RateLimitWindow> {
        self.windows.get(user_id)
    }

    /// Drop windows whose hour began more than `max_age` ago.
    pub fn cleanup(&self, max_age: TimeDelta, now: DateTime<Utc>) {
        let max_age = max_age.max(HOURLY_WINDOW);
        let keep_daily = self.enforce_daily;
        self.windows.retain(&mut |window| {
            let hourly_live = now - window.window_start < max_age;
            let daily_live = keep_daily && now - window.day_start <= DAILY_WINDOW;
            hourly_live || daily_live
        });
    }

    fn status(&self, window: &RateLimitWindow, limits: TierLimits) -> RateLimitStatus {
        let hourly_reset = window.window_start + HOURLY_WINDOW;
        let hourly_remaining = limits.requests_per_hour.saturating_sub(window.request_count);

        if self.enforce_daily {
            let daily_remaining = limits.requests_per_day.saturating_sub(window.daily_count);
            if daily_remaining == 0 {
                return RateLimitStatus::denied(window.day_start + DAILY_WINDOW);
            }
            if hourly_remaining == 0 {
                return RateLimitStatus::denied(hourly_reset);
            }
            return RateLimitStatus {
                allowed: true,
                remaining_requests: hourly_remaining.min(daily_remaining),
                reset_time: hourly_reset,
            };
        }

        if hourly_remaining == 0 {
            return RateLimitStatus::denied(hourly_reset);
        }
        RateLimitStatus {
            allowed: true,
            remaining_requests: hourly_remaining,
            reset_time: hourly_reset,
        }
    }
}

/// Reset whichever windows have run past their length.
fn roll(window: &mut RateLimitWindow, now: DateTime<Utc>) {
    if now - window.window_start > HOURLY_WINDOW {
        window.request_count = 0;
        window.window_start = now;
        window.is_limited = false;
    }
    if now - window.day_start > DAILY_WINDOW {
        window.daily_count = 0;
        window.day_start = now;
    }
}
