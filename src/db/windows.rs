use dashmap::DashMap;

use super::WindowStore;
use crate::models::RateLimitWindow;

#[derive(Default)]
pub struct MemoryWindowStore {
    /// user_id -> current window
    windows: DashMap<String, RateLimitWindow>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WindowStore for MemoryWindowStore {
    fn get(&self, user_id: &str) -> Option<RateLimitWindow> {
        self.windows.get(user_id).map(|w| w.value().clone())
    }

    fn modify(
        &self,
        user_id: &str,
        fresh: RateLimitWindow,
        f: &mut dyn FnMut(&mut RateLimitWindow),
    ) -> RateLimitWindow {
        let mut entry = self.windows.entry(user_id.to_string()).or_insert(fresh);
        f(entry.value_mut());
        entry.value().clone()
    }

    fn retain(&self, keep: &mut dyn FnMut(&RateLimitWindow) -> bool) {
        self.windows.retain(|_, window| keep(window));
    }
}
