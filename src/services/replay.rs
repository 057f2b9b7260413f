//! Linear re-broadcast of a finished game through the render and sink path.
//!
//! Unlike the reconciler there is no ledger: every notable event is posted exactly once, in
//! in-game order, with a fixed pause between posts.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    dao::sink::{NotificationSink, SinkResult},
    services::sport::SportStrategy,
    state::game::{FeedEvent, GameSnapshot},
};

/// Counters of one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Notifications delivered.
    pub posted: usize,
    /// Posts the sink rejected.
    pub failed: usize,
}

/// Drives a historical snapshot through a sink.
pub struct ReplayDriver {
    strategy: Arc<dyn SportStrategy>,
    sink: Arc<dyn NotificationSink>,
    pace: Duration,
}

impl ReplayDriver {
    pub fn new(
        strategy: Arc<dyn SportStrategy>,
        sink: Arc<dyn NotificationSink>,
        pace: Duration,
    ) -> Self {
        Self {
            strategy,
            sink,
            pace,
        }
    }

    /// Notable events of `snapshot`, ordered by period, elapsed time and feed sequence.
    pub fn timeline<'a>(&self, snapshot: &'a GameSnapshot) -> Vec<&'a FeedEvent> {
        let mut events: Vec<&FeedEvent> = snapshot
            .events
            .iter()
            .filter(|event| self.strategy.is_notable(event))
            .collect();
        events.sort_by_key(|event| {
            (
                event.payload.period,
                event.elapsed_in_period(),
                event.sequence,
            )
        });
        events
    }

    /// Open the game's channel and post every notable event, then the final score.
    ///
    /// A failed post is logged and the replay continues.
    pub async fn run(&self, snapshot: &GameSnapshot) -> SinkResult<ReplayReport> {
        let title = self.strategy.channel_title(snapshot);
        let channel = self.sink.ensure_channel(title).await?.handle;
        let mut report = ReplayReport::default();

        let mut contents = vec![self.strategy.render_preview(snapshot)];
        contents.extend(
            self.timeline(snapshot)
                .into_iter()
                .map(|event| self.strategy.render_event(snapshot, event)),
        );
        contents.push(self.strategy.render_final(snapshot));

        for (index, content) in contents.into_iter().enumerate() {
            if index > 0 && !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
            match self.sink.post_content(channel.clone(), content).await {
                Ok(_) => report.posted += 1,
                Err(err) => {
                    warn!(game_id = %snapshot.game_id, index, error = %err, "replay post failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            game_id = %snapshot.game_id,
            posted = report.posted,
            failed = report.failed,
            "replay finished"
        );
        Ok(report)
    }
}
