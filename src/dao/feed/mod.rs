//! Read-only game feeds.

mod fixture;
#[cfg(feature = "nhl-feed")]
pub mod nhl;

use std::{error::Error, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::{
    config::FeedConfig,
    state::game::{GameId, GameSnapshot, TeamId},
};

pub use self::fixture::FixtureFeed;

/// Result alias for feed lookups.
pub type FeedResult<T> = Result<T, FeedError>;

/// Failures surfaced by a feed source.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed does not know this game. Not retried.
    #[error("game `{game_id}` not found in feed")]
    NotFound { game_id: GameId },
    /// Network or upstream failure; the next poll tries again.
    #[error("transient feed failure: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
    /// Upstream asked us to slow down.
    #[error("feed rate limited")]
    RateLimited { retry_after: Option<Duration> },
}

impl FeedError {
    /// Build a transient error from any underlying failure.
    pub fn transient(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        FeedError::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the failure means the game itself is invalid.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::NotFound { .. })
    }
}

/// Source of game snapshots. Calls are idempotent and side-effect free.
pub trait FeedSource: Send + Sync {
    /// Current full snapshot of one game.
    fn snapshot(&self, game_id: &GameId) -> BoxFuture<'static, FeedResult<GameSnapshot>>;

    /// Today's games, restricted to those involving `favorite` when given.
    fn daily_game_ids(&self, favorite: Option<TeamId>)
    -> BoxFuture<'static, FeedResult<Vec<GameId>>>;
}

/// Instantiate the feed described by `config`.
pub fn build_feed(config: &FeedConfig) -> FeedResult<Arc<dyn FeedSource>> {
    match config {
        #[cfg(feature = "nhl-feed")]
        FeedConfig::Nhl { base_url } => Ok(Arc::new(nhl::NhlFeed::new(base_url)?)),
        #[cfg(not(feature = "nhl-feed"))]
        FeedConfig::Nhl { .. } => Err(FeedError::Transient {
            message: "built without the `nhl-feed` feature".into(),
            source: None,
        }),
        FeedConfig::Fixture { dir } => Ok(Arc::new(FixtureFeed::new(dir.clone()))),
    }
}
