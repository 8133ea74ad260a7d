//! Storage interfaces for projects, tenant profiles and quota windows.
//!
//! Every mutation goes through a closure applied while the record's entry is
//! locked, so read-modify-write sequences on one key never interleave. The
//! in-memory implementations are the only backing today; a durable store only
//! has to honour the same per-key atomicity.

pub mod projects;
pub mod users;
pub mod windows;

use crate::models::{Project, RateLimitWindow, UserProfile};

pub use projects::MemoryProjectStore;
pub use users::MemoryUserStore;
pub use windows::MemoryWindowStore;

pub trait ProjectStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Project>;
    fn put(&self, project: Project);
    /// Apply `f` to the stored project. `None` when the id is unknown.
    fn update(&self, id: &str, f: &mut dyn FnMut(&mut Project)) -> Option<Project>;
    fn list(&self) -> Vec<Project>;
}

pub trait UserStore: Send + Sync {
    fn get(&self, user_id: &str) -> Option<UserProfile>;
    /// Insert `profile` if its id is new, otherwise run `on_existing` on the
    /// stored record. Returns `true` when the record already existed.
    fn upsert(&self, profile: UserProfile, on_existing: &mut dyn FnMut(&mut UserProfile)) -> bool;
    fn update(&self, user_id: &str, f: &mut dyn FnMut(&mut UserProfile)) -> Option<UserProfile>;
    fn list(&self) -> Vec<UserProfile>;
}

pub trait WindowStore: Send + Sync {
    fn get(&self, user_id: &str) -> Option<RateLimitWindow>;
    /// Run `f` on the tenant's window, inserting `fresh` first when absent.
    fn modify(
        &self,
        user_id: &str,
        fresh: RateLimitWindow,
        f: &mut dyn FnMut(&mut RateLimitWindow),
    ) -> RateLimitWindow;
    fn retain(&self, keep: &mut dyn FnMut(&RateLimitWindow) -> bool);
}
