//! Keeps one game's notifications in sync with successive feed snapshots.
//!
//! Each pass diffs the notable events of a fresh snapshot against the tracked-event ledger:
//! vanished events are retracted first, then unseen events are posted and changed events are
//! edited in place. A per-game mutex serialises whole passes, including the feed fetch that
//! precedes them, so a slow pass can never interleave with a faster one.

use std::{collections::HashSet, sync::Arc};

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        feed::{FeedResult, FeedSource},
        sink::{ChannelHandle, NotificationHandle, NotificationSink, SinkError},
    },
    services::sport::SportStrategy,
    state::game::{EventId, EventPayload, FeedEvent, GameId, GameSnapshot},
};

/// What to do with events already present in the very first pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillPolicy {
    /// Record them without a notification; used when resuming after a restart.
    SuppressHistory,
    /// Announce them like any other new event.
    AnnounceAll,
}

/// Ledger entry for an event the reconciler has decided is worth a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEvent {
    /// Feed id of the event.
    pub event_id: EventId,
    /// Payload as of the last pass that saw the event.
    pub last_payload: EventPayload,
    /// `None` for back-filled events, which are never announced.
    pub handle: Option<NotificationHandle>,
}

/// Counters describing one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Events posted for the first time.
    pub created: usize,
    /// Events edited in place.
    pub updated: usize,
    /// Events removed from the ledger because the feed dropped them.
    pub retracted: usize,
    /// Events recorded without a notification.
    pub backfilled: usize,
    /// Sink calls that failed.
    pub failed: usize,
}

impl ReconcileReport {
    /// Whether the pass issued no sink call at all.
    pub fn is_quiet(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.retracted == 0 && self.failed == 0
    }
}

struct Ledger {
    tracked: IndexMap<EventId, TrackedEvent>,
    passes: u64,
    policy: BackfillPolicy,
}

/// Diff/reconcile engine for one game.
pub struct EventReconciler {
    game_id: GameId,
    strategy: Arc<dyn SportStrategy>,
    sink: Arc<dyn NotificationSink>,
    channel: ChannelHandle,
    ledger: Mutex<Ledger>,
}

impl EventReconciler {
    pub fn new(
        game_id: GameId,
        strategy: Arc<dyn SportStrategy>,
        sink: Arc<dyn NotificationSink>,
        channel: ChannelHandle,
        policy: BackfillPolicy,
    ) -> Self {
        Self {
            game_id,
            strategy,
            sink,
            channel,
            ledger: Mutex::new(Ledger {
                tracked: IndexMap::new(),
                passes: 0,
                policy,
            }),
        }
    }

    /// Channel receiving this game's notifications.
    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Fetch a fresh snapshot and reconcile it, holding the game's guard across both.
    pub async fn poll(&self, feed: &dyn FeedSource) -> FeedResult<(GameSnapshot, ReconcileReport)> {
        let mut ledger = self.ledger.lock().await;
        let snapshot = feed.snapshot(&self.game_id).await?;
        let report = self.run_pass(&mut ledger, &snapshot).await;
        Ok((snapshot, report))
    }

    /// Reconcile an already fetched snapshot.
    pub async fn reconcile(&self, snapshot: &GameSnapshot) -> ReconcileReport {
        let mut ledger = self.ledger.lock().await;
        self.run_pass(&mut ledger, snapshot).await
    }

    /// Copy of the ledger, in first-seen order.
    pub async fn tracked(&self) -> Vec<TrackedEvent> {
        let ledger = self.ledger.lock().await;
        ledger.tracked.values().cloned().collect()
    }

    async fn run_pass(&self, ledger: &mut Ledger, snapshot: &GameSnapshot) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        // Later duplicates of an id win; the feed should never send any.
        let mut notable: IndexMap<&str, &FeedEvent> = IndexMap::new();
        for event in snapshot.events.iter().filter(|e| self.strategy.is_notable(e)) {
            notable.insert(event.id.as_str(), event);
        }

        // Retractions go first so an id is never retracted and recreated in the same pass.
        let current: HashSet<&str> = notable.keys().copied().collect();
        let stale: Vec<EventId> = ledger
            .tracked
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();
        for event_id in stale {
            let Some(entry) = ledger.tracked.shift_remove(&event_id) else {
                continue;
            };
            if let Some(handle) = entry.handle {
                self.retract(&event_id, handle, &mut report).await;
            }
            report.retracted += 1;
        }

        let backfill = ledger.passes == 0 && ledger.policy == BackfillPolicy::SuppressHistory;
        for event in notable.into_values() {
            match ledger.tracked.get_mut(&event.id) {
                None if backfill => {
                    ledger.tracked.insert(
                        event.id.clone(),
                        TrackedEvent {
                            event_id: event.id.clone(),
                            last_payload: event.payload.clone(),
                            handle: None,
                        },
                    );
                    report.backfilled += 1;
                }
                None => {
                    if let Some(tracked) = self.announce(snapshot, event, &mut report).await {
                        ledger.tracked.insert(event.id.clone(), tracked);
                    }
                }
                Some(tracked) if tracked.last_payload == event.payload => {}
                Some(tracked) => {
                    if !self.revise(snapshot, event, tracked, &mut report).await {
                        ledger.tracked.shift_remove(&event.id);
                    }
                }
            }
        }

        ledger.passes += 1;
        if report.is_quiet() {
            debug!(game_id = %self.game_id, pass = ledger.passes, "reconciliation pass: no changes");
        } else {
            info!(
                game_id = %self.game_id,
                pass = ledger.passes,
                created = report.created,
                updated = report.updated,
                retracted = report.retracted,
                failed = report.failed,
                "reconciliation pass applied"
            );
        }
        report
    }

    /// Post a new event. A failed post leaves the event untracked so the next pass retries it.
    async fn announce(
        &self,
        snapshot: &GameSnapshot,
        event: &FeedEvent,
        report: &mut ReconcileReport,
    ) -> Option<TrackedEvent> {
        let content = self.strategy.render_event(snapshot, event);
        match self.sink.post_content(self.channel.clone(), content).await {
            Ok(handle) => {
                report.created += 1;
                Some(TrackedEvent {
                    event_id: event.id.clone(),
                    last_payload: event.payload.clone(),
                    handle: Some(handle),
                })
            }
            Err(err) => {
                warn!(game_id = %self.game_id, event_id = %event.id, error = %err, "failed to post event");
                report.failed += 1;
                None
            }
        }
    }

    /// Edit an already announced event. The stored payload is replaced whatever the outcome.
    ///
    /// Returns `false` when the notification vanished out-of-band; the caller drops the entry
    /// so the next pass posts it afresh.
    async fn revise(
        &self,
        snapshot: &GameSnapshot,
        event: &FeedEvent,
        tracked: &mut TrackedEvent,
        report: &mut ReconcileReport,
    ) -> bool {
        tracked.last_payload = event.payload.clone();

        // Back-filled events are never announced retroactively, even once they change.
        let Some(handle) = tracked.handle.clone() else {
            debug!(game_id = %self.game_id, event_id = %event.id, "back-filled event changed; not announcing");
            return true;
        };

        let content = self.strategy.render_event(snapshot, event);
        match self.sink.edit_content(handle, content).await {
            Ok(handle) => {
                tracked.handle = Some(handle);
                report.updated += 1;
                true
            }
            Err(SinkError::HandleGone { handle }) => {
                debug!(game_id = %self.game_id, event_id = %event.id, %handle, "notification vanished; dropping entry");
                false
            }
            Err(err) => {
                warn!(game_id = %self.game_id, event_id = %event.id, error = %err, "failed to edit event");
                report.failed += 1;
                true
            }
        }
    }

    async fn retract(&self, event_id: &str, handle: NotificationHandle, report: &mut ReconcileReport) {
        match self.sink.delete_content(handle).await {
            Ok(()) => {
                info!(game_id = %self.game_id, event_id, "retracted event");
            }
            Err(SinkError::HandleGone { .. }) => {
                debug!(game_id = %self.game_id, event_id, "retracted event was already gone");
            }
            Err(err) => {
                warn!(game_id = %self.game_id, event_id, error = %err, "failed to retract event");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        services::sport::Hockey,
        state::game::GameStatus,
        test_support::{
            RecordingSink, Scripted, ScriptedFeed, SinkCall, goal, penalty, shot, snapshot,
        },
    };

    fn reconciler(sink: &RecordingSink, policy: BackfillPolicy) -> EventReconciler {
        EventReconciler::new(
            GameId::from("g1"),
            Arc::new(Hockey),
            Arc::new(sink.clone()),
            ChannelHandle("ch".into()),
            policy,
        )
    }

    fn live(events: Vec<FeedEvent>) -> GameSnapshot {
        snapshot("g1", GameStatus::Live, events)
    }

    #[tokio::test]
    async fn identical_snapshot_is_idempotent() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);
        let snap = live(vec![goal("1", "A. Matthews", &[]), penalty("2", 1, "06:00")]);

        reconciler.reconcile(&snap).await;
        let calls_after_first = sink.calls().len();
        let report = reconciler.reconcile(&snap).await;

        assert_eq!(calls_after_first, 2);
        assert_eq!(sink.calls().len(), calls_after_first);
        assert!(report.is_quiet());
    }

    #[tokio::test]
    async fn unchanged_event_is_posted_once_across_many_passes() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);
        let snap = live(vec![goal("1", "A. Matthews", &[])]);

        for _ in 0..5 {
            reconciler.reconcile(&snap).await;
        }

        assert_eq!(sink.count(|c| matches!(c, SinkCall::Post(..))), 1);
    }

    #[tokio::test]
    async fn changed_payload_edits_original_handle() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let original = reconciler.tracked().await[0].handle.clone().unwrap();

        let revised = goal("1", "A. Matthews", &["M. Marner"]);
        let report = reconciler.reconcile(&live(vec![revised.clone()])).await;

        assert_eq!(report.updated, 1);
        let edits: Vec<_> = sink
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Edit(handle, content) => Some((handle, content)),
                _ => None,
            })
            .collect();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].0, original);
        assert!(edits[0].1.body.contains("M. Marner"));

        let tracked = reconciler.tracked().await;
        assert_eq!(tracked[0].last_payload, revised.payload);
        assert_eq!(tracked[0].handle.as_ref(), Some(&original));
    }

    #[tokio::test]
    async fn vanished_event_is_retracted() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler
            .reconcile(&live(vec![goal("1", "A. Matthews", &[]), penalty("2", 1, "06:00")]))
            .await;
        let overturned = reconciler.tracked().await[0].handle.clone().unwrap();

        let report = reconciler.reconcile(&live(vec![penalty("2", 1, "06:00")])).await;

        assert_eq!(report.retracted, 1);
        assert!(sink.calls().contains(&SinkCall::Delete(overturned)));
        let ids: Vec<_> = reconciler.tracked().await.into_iter().map(|t| t.event_id).collect();
        assert_eq!(ids, vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn empty_snapshot_is_a_pure_retraction_pass() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let report = reconciler.reconcile(&live(Vec::new())).await;

        assert_eq!(report.retracted, 1);
        assert_eq!(report.created, 0);
        assert!(reconciler.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn first_pass_backfills_history_without_posting() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::SuppressHistory);
        let snap = live(vec![
            goal("1", "A. Matthews", &[]),
            penalty("2", 1, "06:00"),
            goal("3", "W. Nylander", &[]),
        ]);

        let report = reconciler.reconcile(&snap).await;

        assert_eq!(report.backfilled, 3);
        assert_eq!(sink.count(|c| matches!(c, SinkCall::Post(..))), 0);
        let tracked = reconciler.tracked().await;
        assert_eq!(tracked.len(), 3);
        assert!(tracked.iter().all(|t| t.handle.is_none()));
    }

    #[tokio::test]
    async fn events_after_backfill_are_announced() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::SuppressHistory);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let report = reconciler
            .reconcile(&live(vec![goal("1", "A. Matthews", &[]), goal("3", "W. Nylander", &[])]))
            .await;

        assert_eq!(report.created, 1);
        assert_eq!(sink.posts().len(), 1);
        assert!(sink.posts()[0].body.contains("W. Nylander"));
    }

    #[tokio::test]
    async fn backfilled_event_change_is_not_announced() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::SuppressHistory);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let revised = goal("1", "A. Matthews", &["M. Marner"]);
        reconciler.reconcile(&live(vec![revised.clone()])).await;

        assert!(sink.calls().is_empty());
        let tracked = reconciler.tracked().await;
        assert_eq!(tracked[0].last_payload, revised.payload);
        assert!(tracked[0].handle.is_none());
    }

    #[tokio::test]
    async fn non_notable_events_are_ignored() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler.reconcile(&live(vec![shot("1"), goal("2", "A. Matthews", &[])])).await;

        assert_eq!(sink.posts().len(), 1);
        assert_eq!(reconciler.tracked().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_post_does_not_abort_pass_and_is_retried() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);
        let snap = live(vec![goal("1", "A. Matthews", &[]), penalty("2", 1, "06:00")]);
        sink.fail_next_posts(1);

        let first = reconciler.reconcile(&snap).await;
        assert_eq!(first.failed, 1);
        assert_eq!(first.created, 1);
        assert_eq!(reconciler.tracked().await.len(), 1);

        let second = reconciler.reconcile(&snap).await;
        assert_eq!(second.created, 1);
        assert_eq!(reconciler.tracked().await.len(), 2);
    }

    #[tokio::test]
    async fn vanished_notification_is_posted_again_next_pass() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let handle = reconciler.tracked().await[0].handle.clone().unwrap();
        sink.vanish(&handle);

        let revised = live(vec![goal("1", "A. Matthews", &["M. Marner"])]);
        reconciler.reconcile(&revised).await;
        assert!(reconciler.tracked().await.is_empty());

        let report = reconciler.reconcile(&revised).await;

        assert_eq!(report.created, 1);
        assert_eq!(sink.count(|c| matches!(c, SinkCall::Edit(..))), 1);
        assert_eq!(sink.posts().len(), 2);
        assert!(sink.posts()[1].body.contains("M. Marner"));
        let tracked = reconciler.tracked().await;
        assert_eq!(tracked.len(), 1);
        assert!(tracked[0].handle.as_ref().is_some_and(|h| *h != handle));
    }

    #[tokio::test]
    async fn retracting_backfilled_event_issues_no_delete() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::SuppressHistory);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let report = reconciler.reconcile(&live(Vec::new())).await;

        assert_eq!(report.retracted, 1);
        assert!(sink.calls().is_empty());
        assert!(reconciler.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn retracting_already_deleted_notification_is_silent() {
        let sink = RecordingSink::new();
        let reconciler = reconciler(&sink, BackfillPolicy::AnnounceAll);

        reconciler.reconcile(&live(vec![goal("1", "A. Matthews", &[])])).await;
        let handle = reconciler.tracked().await[0].handle.clone().unwrap();
        sink.vanish(&handle);

        let report = reconciler.reconcile(&live(Vec::new())).await;

        assert!(sink.calls().contains(&SinkCall::Delete(handle)));
        assert_eq!(report.retracted, 1);
        assert_eq!(report.failed, 0);
        assert!(reconciler.tracked().await.is_empty());
    }

    #[tokio::test]
    async fn overlapping_polls_are_serialised() {
        let sink = RecordingSink::new();
        let feed = ScriptedFeed::new().with_delay(Duration::from_millis(50));
        feed.script(
            "g1",
            vec![Scripted::Snapshot(live(vec![goal("1", "A. Matthews", &[])]))],
        );
        let reconciler = Arc::new(reconciler(&sink, BackfillPolicy::AnnounceAll));

        let first = {
            let reconciler = reconciler.clone();
            let feed = feed.clone();
            tokio::spawn(async move { reconciler.poll(&feed).await.map(|(_, r)| r) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let reconciler = reconciler.clone();
            let feed = feed.clone();
            tokio::spawn(async move { reconciler.poll(&feed).await.map(|(_, r)| r) })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(
            feed.log(),
            vec!["fetch:start:g1", "fetch:end:g1", "fetch:start:g1", "fetch:end:g1"]
        );
        assert_eq!(first.created, 1);
        assert!(second.is_quiet());
    }
}
