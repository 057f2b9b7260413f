use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "manual_only").
    pub status: String,
    /// Number of games with a running controller.
    pub tracked_games: usize,
    /// Clients currently listening on the notification stream.
    pub subscribers: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is fully operational.
    pub fn ok(tracked_games: usize, subscribers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            tracked_games,
            subscribers,
        }
    }

    /// Create a health response indicating discovery is limited to manual tracking.
    pub fn manual_only(tracked_games: usize, subscribers: usize) -> Self {
        Self {
            status: "manual_only".to_string(),
            tracked_games,
            subscribers,
        }
    }
}
