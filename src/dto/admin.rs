//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::validation::validate_game_id,
    services::fleet_supervisor::{DiscoveryReport, TrackedGame},
    state::{game::GameId, lifecycle::GameSessionState},
};

/// Request to start tracking a game by its feed identifier.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackGameRequest {
    /// Feed identifier, e.g. `2024020001`.
    pub game_id: String,
}

impl Validate for TrackGameRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_game_id(&self.game_id) {
            errors.add("game_id", e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Projection of a tracked game listed for administrators.
#[derive(Debug, Serialize, ToSchema)]
pub struct TrackedGameItem {
    pub game_id: GameId,
    /// Current phase; absent when the game is in the manual set but not running.
    pub phase: Option<GameSessionState>,
    /// Whether an operator asked for this game.
    pub manual: bool,
}

impl From<TrackedGame> for TrackedGameItem {
    fn from(game: TrackedGame) -> Self {
        Self {
            game_id: game.game_id,
            phase: game.phase,
            manual: game.manual,
        }
    }
}

/// Result of a manual discovery pass.
#[derive(Debug, Serialize, ToSchema)]
pub struct DiscoveryResponse {
    pub started: usize,
    pub already_active: usize,
    /// `true` when no favorite team is configured.
    pub manual_only: bool,
}

impl From<DiscoveryReport> for DiscoveryResponse {
    fn from(report: DiscoveryReport) -> Self {
        Self {
            started: report.started,
            already_active: report.already_active,
            manual_only: report.manual_only,
        }
    }
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
