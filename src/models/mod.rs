pub mod oauth;
pub mod project;
pub mod rate_limit;
pub mod repository;
pub mod user;

pub use oauth::{OwnerUser, Person, TokenOwner, TokenResponse};
pub use project::{Project, ProjectStatus, ProjectUpdate, TransitionPolicy};
pub use rate_limit::{RateLimitStatus, RateLimitWindow};
pub use repository::{CreateRepository, RepositoryInfo, RepositoryOwner, RepositoryVisibility};
pub use user::{Tier, TierLimits, UserProfile, UserStats};
