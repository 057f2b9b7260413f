use tracing::debug;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report how many games are tracked and whether discovery is limited to manual tracking.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let tracked = state.supervisor().active_count();
    let subscribers = state.notifications().subscriber_count();

    if state.supervisor().favorite_team().is_none() {
        debug!("no favorite team configured; reporting manual-only mode");
        HealthResponse::manual_only(tracked, subscribers)
    } else {
        HealthResponse::ok(tracked, subscribers)
    }
}
