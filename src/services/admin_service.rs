use tracing::info;

use crate::{
    dto::admin::{DiscoveryResponse, TrackGameRequest, TrackedGameItem},
    error::ServiceError,
    state::{SharedState, game::GameId},
};

/// List every tracked game, running or only present in the manual set.
pub async fn list_games(state: &SharedState) -> Vec<TrackedGameItem> {
    state
        .supervisor()
        .tracked_games()
        .await
        .into_iter()
        .map(Into::into)
        .collect()
}

/// Start tracking a game; fails with `AlreadyTracked` when it is tracked already.
pub async fn track_game(
    state: &SharedState,
    request: TrackGameRequest,
) -> Result<TrackedGameItem, ServiceError> {
    let game_id = GameId::new(request.game_id);
    if !state.supervisor().track_game_by_id(game_id.clone()).await? {
        return Err(ServiceError::AlreadyTracked(game_id));
    }
    info!(%game_id, "game tracked through admin API");

    let item = state
        .supervisor()
        .tracked_games()
        .await
        .into_iter()
        .find(|game| game.game_id == game_id)
        .map(TrackedGameItem::from)
        .unwrap_or(TrackedGameItem {
            game_id,
            phase: None,
            manual: true,
        });
    Ok(item)
}

/// Stop tracking a game.
pub async fn stop_game(state: &SharedState, game_id: String) -> Result<(), ServiceError> {
    state.supervisor().stop_game(&GameId::new(game_id)).await
}

/// Run a discovery pass immediately.
pub async fn run_discovery(state: &SharedState) -> Result<DiscoveryResponse, ServiceError> {
    Ok(state.supervisor().discovery_pass().await?.into())
}
