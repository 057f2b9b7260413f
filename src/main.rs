//! score-relay binary entrypoint wiring the fleet supervisor, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use score_relay::{
    config::AppConfig,
    dao::{feed::build_feed, sink::BroadcastSink, tracked_games::JsonFileStore},
    routes,
    services::fleet_supervisor::{FleetSupervisor, SupervisorDeps},
    state::{AppState, SharedState, SseHub},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let hub = SseHub::default();
    let feed = build_feed(&config.feed).context("building feed source")?;

    let supervisor = FleetSupervisor::new(
        SupervisorDeps {
            strategy: config.sport.strategy(),
            feed,
            sink: Arc::new(BroadcastSink::new(hub.clone())),
            store: Arc::new(JsonFileStore::new(config.tracked_games_path.clone())),
        },
        config.favorite_team_id,
        config.polling,
    );

    // Discovery hits the feed; the HTTP surface comes up without waiting for it.
    tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.initialize().await }
    });

    let app_state = AppState::new(supervisor.clone(), hub, config.admin_token.clone());
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, sport = ?config.sport, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    supervisor.stop_all();
    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
