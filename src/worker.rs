use std::time::Duration;

use chrono::TimeDelta;
use tokio::sync::watch;

use crate::routes::auth::prune_states;
use crate::state::SharedState;

pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically drop expired quota windows and unredeemed OAuth states
/// until shutdown is signaled.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!("Housekeeping started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(HOUSEKEEPING_INTERVAL) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        // Windows older than two hours can no longer affect a quota decision.
        state.registry.cleanup_windows(TimeDelta::hours(2));
        prune_states(&state);
    }

    tracing::debug!("Housekeeping stopped");
}
