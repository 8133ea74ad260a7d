use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::config::Config;
use crate::deploy::BuildOrchestrator;
use crate::gateway::CentralGateway;
use crate::github::Provisioner;
use crate::lifecycle::ProjectLifecycle;
use crate::registry::UserRegistry;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub registry: Arc<UserRegistry>,
    pub lifecycle: Arc<ProjectLifecycle>,
    /// Absent without a central content token.
    pub gateway: Option<CentralGateway>,
    /// Absent without a version-control token.
    pub provisioner: Option<Arc<Provisioner>>,
    pub builds: Option<BuildOrchestrator>,
    /// Issued OAuth `state` values awaiting the callback.
    pub oauth_states: DashMap<String, Instant>,
}
