//! Per-sport behaviour injected into the reconciler, controller and replay driver.

mod baseball;
mod hockey;

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    dao::sink::NotificationContent,
    state::game::{FeedEvent, GameSnapshot, GameStatus},
};

pub use self::{baseball::Baseball, hockey::Hockey};

/// Supported sports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    #[default]
    Hockey,
    Baseball,
}

impl Sport {
    /// Instantiate the strategy for this sport.
    pub fn strategy(self) -> Arc<dyn SportStrategy> {
        match self {
            Sport::Hockey => Arc::new(Hockey),
            Sport::Baseball => Arc::new(Baseball),
        }
    }
}

/// What differs between sports: which events matter, when a game is over, whether a
/// post-game summary is worth waiting for, and how everything is worded.
pub trait SportStrategy: Send + Sync {
    /// Whether `event` deserves its own notification.
    fn is_notable(&self, event: &FeedEvent) -> bool;

    /// Whether `status` ends live tracking.
    fn is_terminal(&self, status: GameStatus) -> bool {
        status.is_over()
    }

    /// Whether the authoritative post-game summary lags the final status.
    fn settles(&self) -> bool;

    /// Deterministic title of the game's channel, stable across restarts.
    fn channel_title(&self, snapshot: &GameSnapshot) -> String {
        format!(
            "{} @ {} ({})",
            snapshot.away.abbrev, snapshot.home.abbrev, snapshot.game_id
        )
    }

    fn render_preview(&self, snapshot: &GameSnapshot) -> NotificationContent;

    fn render_event(&self, snapshot: &GameSnapshot, event: &FeedEvent) -> NotificationContent;

    fn render_final(&self, snapshot: &GameSnapshot) -> NotificationContent {
        NotificationContent::new(
            "Final",
            format!(
                "{} {} - {} {}",
                snapshot.away.abbrev, snapshot.score.away, snapshot.home.abbrev, snapshot.score.home
            ),
        )
    }

    /// Summary notification; `snapshot.summary` is `None` when the settling window expired.
    fn render_summary(&self, snapshot: &GameSnapshot) -> NotificationContent;
}

/// Ordinal label (`1st`, `2nd`, `3rd`, `4th`).
pub(crate) fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
