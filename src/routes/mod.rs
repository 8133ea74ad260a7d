pub mod admin;
pub mod auth;
pub mod central;
pub mod projects;

use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // OAuth
        .route("/api/auth/notion/authorize", get(auth::authorize))
        .route("/api/auth/notion/callback", get(auth::callback))
        // Projects
        .route(
            "/api/project/{id}",
            get(projects::get).put(projects::update),
        )
        .route("/api/project/{id}/access", get(projects::check_access))
        .route("/api/build/create", post(projects::create_build))
        // Central integration
        .route("/api/central/register", post(central::register))
        .route("/api/central/navigation", get(central::navigation))
        .route("/api/central/gallery", get(central::gallery))
        // Admin
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/{id}/stats", get(admin::user_stats))
        .route(
            "/api/admin/users/{id}/deactivate",
            post(admin::deactivate_user),
        )
        .route("/api/admin/projects", get(admin::list_projects))
        .route("/api/admin/repositories", get(admin::list_repositories))
        .route(
            "/api/admin/repositories/{owner}/{repo}",
            get(admin::get_repository).delete(admin::delete_repository),
        )
        .route(
            "/api/admin/repositories/{owner}/{repo}/workflows/{workflow_id}",
            post(admin::trigger_workflow),
        )
}
