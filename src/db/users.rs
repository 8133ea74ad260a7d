use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::UserStore;
use crate::models::UserProfile;

#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<String, UserProfile>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).map(|u| u.value().clone())
    }

    fn upsert(&self, profile: UserProfile, on_existing: &mut dyn FnMut(&mut UserProfile)) -> bool {
        match self.users.entry(profile.user_id.clone()) {
            Entry::Occupied(mut entry) => {
                on_existing(entry.get_mut());
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(profile);
                false
            }
        }
    }

    fn update(&self, user_id: &str, f: &mut dyn FnMut(&mut UserProfile)) -> Option<UserProfile> {
        let mut entry = self.users.get_mut(user_id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    fn list(&self) -> Vec<UserProfile> {
        let mut users: Vec<UserProfile> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        users
    }
}
