pub mod config;
pub mod error;
pub mod state;
pub mod auth;
pub mod db;
pub mod models;
pub mod routes;
pub mod crypto;
pub mod rate_limit;
pub mod registry;
pub mod notion;
pub mod github;
pub mod gateway;
pub mod lifecycle;
pub mod deploy;
pub mod worker;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use dashmap::DashMap;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::{MemoryProjectStore, MemoryUserStore, MemoryWindowStore};
use crate::deploy::BuildOrchestrator;
use crate::gateway::CentralGateway;
use crate::github::Provisioner;
use crate::lifecycle::ProjectLifecycle;
use crate::notion::NotionClient;
use crate::registry::UserRegistry;
use crate::state::{AppState, SharedState};

/// Wire every service once and mount the API.
pub fn build_app(config: Config) -> (Router, SharedState) {
    let notion = NotionClient::new(config.notion.api_base.clone());

    let registry = Arc::new(UserRegistry::new(
        Arc::new(MemoryUserStore::new()),
        Arc::new(MemoryWindowStore::new()),
        config.quota.enforce_daily,
    ));

    let lifecycle = Arc::new(ProjectLifecycle::new(
        notion.clone(),
        config.notion.clone(),
        Arc::new(MemoryProjectStore::new()),
        config.encryption_key.clone(),
        config.transition_policy,
    ));

    let gateway = match &config.central_token {
        Some(token) => {
            tracing::info!("Central integration configured");
            Some(CentralGateway::new(
                notion.clone(),
                token.clone(),
                registry.clone(),
                config.notion.requests_per_second,
            ))
        }
        None => {
            tracing::warn!("CENTRAL_NOTION_TOKEN not set, central integration disabled");
            None
        }
    };

    let provisioner = match &config.github {
        Some(github) => {
            tracing::info!(
                "Repository provisioning from template {}/{}",
                github.template_owner,
                github.template_repo
            );
            Some(Arc::new(Provisioner::new(github.clone())))
        }
        None => {
            tracing::warn!("GITHUB_TOKEN not set, repository provisioning disabled");
            None
        }
    };

    let builds = provisioner.as_ref().map(|provisioner| {
        BuildOrchestrator::new(lifecycle.clone(), provisioner.clone(), config.deploy.clone())
    });

    let state: SharedState = Arc::new(AppState {
        config,
        registry,
        lifecycle,
        gateway,
        provisioner,
        builds,
        oauth_states: DashMap::new(),
    });

    let app = Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
