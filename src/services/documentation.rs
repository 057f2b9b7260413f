use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for score-relay.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::notification_stream,
        crate::routes::admin::list_games,
        crate::routes::admin::track_game,
        crate::routes::admin::stop_game,
        crate::routes::admin::run_discovery,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::admin::TrackGameRequest,
            crate::dto::admin::TrackedGameItem,
            crate::dto::admin::DiscoveryResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::sse::ChannelCreatedEvent,
            crate::dto::sse::NotificationEvent,
            crate::dto::sse::NotificationDeletedEvent,
            crate::state::lifecycle::GameSessionState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "admin", description = "Tracked game management"),
    )
)]
pub struct ApiDoc;
