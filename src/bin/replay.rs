//! Replay a finished game through the notification pipeline.
//!
//! Usage: `replay <snapshot.json | game-id>`. A path to an existing file is read as a
//! fixture snapshot; anything else is looked up through the configured feed.

use std::{env, path::Path, sync::Arc};

use anyhow::{Context, bail};
use score_relay::{
    config::AppConfig,
    dao::{
        feed::{FixtureFeed, build_feed},
        sink::BroadcastSink,
    },
    services::replay::ReplayDriver,
    state::{SseHub, game::GameId},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let Some(target) = env::args().nth(1) else {
        bail!("usage: replay <snapshot.json | game-id>");
    };

    let config = AppConfig::load();
    let path = Path::new(&target);
    let snapshot = if path.is_file() {
        FixtureFeed::load_file(path)
            .await
            .with_context(|| format!("loading snapshot `{}`", path.display()))?
    } else {
        let feed = build_feed(&config.feed).context("building feed source")?;
        feed.snapshot(&GameId::new(target.clone()))
            .await
            .with_context(|| format!("fetching game `{target}`"))?
    };

    if !snapshot.status.is_over() {
        bail!(
            "game `{}` is not finished (status {:?})",
            snapshot.game_id,
            snapshot.status
        );
    }

    let hub = SseHub::default();
    let sink = BroadcastSink::new(hub);
    let driver = ReplayDriver::new(
        config.sport.strategy(),
        Arc::new(sink.clone()),
        config.replay_pace,
    );

    info!(game_id = %snapshot.game_id, events = snapshot.events.len(), "replaying game");
    let report = driver.run(&snapshot).await.context("replaying game")?;
    info!(
        posted = report.posted,
        failed = report.failed,
        retained = sink.message_count(),
        "replay complete"
    );
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
