use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::response::Redirect;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::SharedState;

/// How long an issued OAuth `state` stays redeemable.
const STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn error_redirect(reason: &str) -> Redirect {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", reason)
        .finish();
    Redirect::to(&format!("/auth/error?{query}"))
}

pub async fn authorize(State(state): State<SharedState>) -> Result<Redirect, AppError> {
    let oauth_state = generate_state();
    state.oauth_states.insert(oauth_state.clone(), Instant::now());

    let url = state.lifecycle.authorization_url(Some(&oauth_state));
    Ok(Redirect::to(&url))
}

pub async fn callback(
    State(state): State<SharedState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    if let Some(error) = params.error {
        tracing::warn!("OAuth error: {error}");
        return error_redirect(&error);
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return error_redirect("missing_code");
    };

    let issued = params
        .state
        .and_then(|s| state.oauth_states.remove(&s))
        .map(|(_, issued)| issued);
    if !issued.is_some_and(|at| at.elapsed() < STATE_TTL) {
        return error_redirect("invalid_state");
    }

    let token = match state.lifecycle.exchange_code_for_token(&code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("OAuth callback error: {e}");
            return error_redirect(&e.to_string());
        }
    };

    match state.lifecycle.create_user_project(token).await {
        Ok(project) => Redirect::to(&format!("/dashboard/{}", project.id)),
        Err(e) => {
            tracing::error!("OAuth callback error: {e}");
            error_redirect(&e.to_string())
        }
    }
}

/// Forget states that were never redeemed.
pub fn prune_states(state: &SharedState) {
    state
        .oauth_states
        .retain(|_, issued| issued.elapsed() < STATE_TTL);
}
