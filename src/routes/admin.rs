use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use axum_valid::Valid;

use crate::{
    dto::admin::{DiscoveryResponse, TrackGameRequest, TrackedGameItem},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints for managing tracked games.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/games", get(list_games).post(track_game))
        .route("/admin/games/{id}", delete(stop_game))
        .route("/admin/discovery", post(run_discovery))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// List tracked games with their current phase.
#[utoipa::path(
    get,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses((status = 200, description = "Tracked games", body = [TrackedGameItem]))
)]
pub async fn list_games(State(state): State<SharedState>) -> Json<Vec<TrackedGameItem>> {
    Json(admin_service::list_games(&state).await)
}

/// Start tracking a game by id.
#[utoipa::path(
    post,
    path = "/admin/games",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    request_body = TrackGameRequest,
    responses(
        (status = 201, description = "Game tracked", body = TrackedGameItem),
        (status = 400, description = "Invalid game id"),
        (status = 409, description = "Game already tracked")
    )
)]
pub async fn track_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<TrackGameRequest>>,
) -> Result<(StatusCode, Json<TrackedGameItem>), AppError> {
    let item = admin_service::track_game(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Stop tracking a game.
#[utoipa::path(
    delete,
    path = "/admin/games/{id}",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured"),
    ("id" = String, Path, description = "Identifier of the game to stop")),
    responses(
        (status = 204, description = "Stop requested"),
        (status = 404, description = "Game not tracked")
    )
)]
pub async fn stop_game(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    admin_service::stop_game(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a discovery pass now instead of waiting for the daily timer.
#[utoipa::path(
    post,
    path = "/admin/discovery",
    tag = "admin",
    params(("X-Admin-Token" = Option<String>, Header, description = "Admin token, when one is configured")),
    responses((status = 200, description = "Discovery pass finished", body = DiscoveryResponse))
)]
pub async fn run_discovery(
    State(state): State<SharedState>,
) -> Result<Json<DiscoveryResponse>, AppError> {
    Ok(Json(admin_service::run_discovery(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.admin_token() else {
        return Ok(next.run(req).await);
    };

    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if provided == expected {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin token".into()))
    }
}
