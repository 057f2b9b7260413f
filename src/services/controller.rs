//! Per-game controller: owns the lifecycle phase, the polling cadence and the reconciler.

use std::{future::Future, sync::Arc, time::Duration};

use futures::future::BoxFuture;

use tokio::{
    sync::{mpsc, watch},
    time::{Instant, MissedTickBehavior, interval, interval_at, timeout},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::PollingConfig,
    dao::{
        feed::{FeedError, FeedSource},
        sink::{ChannelHandle, NotificationContent, NotificationHandle, NotificationSink},
    },
    error::ServiceError,
    services::{
        reconciler::{BackfillPolicy, EventReconciler},
        sport::SportStrategy,
    },
    state::{
        game::{GameId, GameSnapshot, GameStatus},
        lifecycle::{GameLifecycle, GameSessionState, LifecycleEvent, Plan},
    },
};

/// Sent to the supervisor once a controller reaches a terminal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerExit {
    /// Game the controller was tracking.
    pub game_id: GameId,
    /// Identifies which controller instance exited.
    pub instance: Uuid,
    /// Terminal phase reached.
    pub state: GameSessionState,
}

/// One applied lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    /// Phase before the transition.
    pub from: GameSessionState,
    /// Phase after the transition.
    pub to: GameSessionState,
    /// Event that drove it.
    pub event: LifecycleEvent,
}

/// Outcome of the controller's first channel lookup, kept across retries.
struct OpenedChannel {
    handle: ChannelHandle,
    /// Set when this controller created the channel and the preview is not delivered yet.
    preview_pending: bool,
}

/// Drives one game from discovery to a terminal phase.
pub struct GameController {
    game_id: GameId,
    instance: Uuid,
    strategy: Arc<dyn SportStrategy>,
    feed: Arc<dyn FeedSource>,
    sink: Arc<dyn NotificationSink>,
    polling: PollingConfig,
    lifecycle: GameLifecycle,
    channel: Option<OpenedChannel>,
    reconciler: Option<EventReconciler>,
    last_snapshot: Option<GameSnapshot>,
    settling_deadline: Option<Instant>,
    history: Vec<TransitionRecord>,
    phase_tx: watch::Sender<GameSessionState>,
}

impl GameController {
    pub fn new(
        game_id: GameId,
        strategy: Arc<dyn SportStrategy>,
        feed: Arc<dyn FeedSource>,
        sink: Arc<dyn NotificationSink>,
        polling: PollingConfig,
    ) -> Self {
        let (phase_tx, _rx) = watch::channel(GameSessionState::Discovered);
        Self {
            game_id,
            instance: Uuid::new_v4(),
            strategy,
            feed,
            sink,
            polling,
            lifecycle: GameLifecycle::new(),
            channel: None,
            reconciler: None,
            last_snapshot: None,
            settling_deadline: None,
            history: Vec::new(),
            phase_tx,
        }
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn instance(&self) -> Uuid {
        self.instance
    }

    pub fn phase(&self) -> GameSessionState {
        self.lifecycle.phase()
    }

    /// Follow phase changes from outside the controller task.
    pub fn phase_watcher(&self) -> watch::Receiver<GameSessionState> {
        self.phase_tx.subscribe()
    }

    /// Transitions applied so far, oldest first.
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Polling period of the current phase.
    pub fn cadence(&self) -> Duration {
        match self.phase() {
            GameSessionState::Live => self.polling.live,
            GameSessionState::Settling => self.polling.settling,
            _ => self.polling.pregame,
        }
    }

    /// Run the controller until it reaches a terminal phase or is told to stop, then report
    /// the exit to the supervisor.
    ///
    /// Each tick is awaited inside the loop, so ticks never overlap; missed ticks are skipped.
    /// The stop signal is only observed between ticks.
    pub async fn run(
        mut self,
        mut stop: watch::Receiver<bool>,
        exits: mpsc::UnboundedSender<ControllerExit>,
    ) {
        let mut period = self.cadence();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.phase().is_terminal() {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow_and_update() {
                        self.stop().await;
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                    let next = self.cadence();
                    if next != period {
                        period = next;
                        ticker = interval_at(Instant::now() + period, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
            }
        }

        let exit = ControllerExit {
            game_id: self.game_id.clone(),
            instance: self.instance,
            state: self.phase(),
        };
        if exits.send(exit).is_err() {
            debug!(game_id = %self.game_id, "supervisor is gone; exit not reported");
        }
    }

    /// Perform one poll of the current phase and return the resulting phase.
    pub async fn tick(&mut self) -> GameSessionState {
        match self.phase() {
            GameSessionState::Discovered => self.on_discovered().await,
            GameSessionState::PregameWatch => self.on_pregame().await,
            GameSessionState::Live => self.on_live().await,
            GameSessionState::Settling => self.on_settling().await,
            GameSessionState::Completed | GameSessionState::Errored => {}
        }
        self.phase()
    }

    /// Stop tracking; the game ends up `Completed`.
    pub async fn stop(&mut self) {
        if self.phase().is_terminal() {
            return;
        }
        info!(game_id = %self.game_id, phase = %self.phase(), "stopping controller on request");
        if let Err(err) = self.run_transition(LifecycleEvent::Stop, no_work).await {
            self.transition_failed(err);
        }
    }

    async fn on_discovered(&mut self) {
        let Some(snapshot) = self.fetch().await else {
            return;
        };

        let event = if self.strategy.is_terminal(snapshot.status) {
            info!(game_id = %self.game_id, status = ?snapshot.status, "game already over at discovery");
            LifecycleEvent::AlreadyFinished
        } else if snapshot.status == GameStatus::Live {
            self.resume(snapshot).await;
            return;
        } else {
            LifecycleEvent::Watch
        };

        if let Err(err) = self.run_transition(event, no_work).await {
            self.transition_failed(err);
        }
    }

    /// Pick up a game that was already live when discovered, typically after a restart.
    async fn resume(&mut self, snapshot: GameSnapshot) {
        let Some(work) = self.open_channel(&snapshot).await else {
            return;
        };
        match self.run_transition(LifecycleEvent::Resume, || work).await {
            Ok((channel, _)) => {
                self.preview_delivered();
                let reconciler = self.reconciler_for(channel, BackfillPolicy::SuppressHistory);
                reconciler.reconcile(&snapshot).await;
                self.reconciler = Some(reconciler);
                self.last_snapshot = Some(snapshot);
            }
            Err(err) => self.transition_failed(err),
        }
    }

    async fn on_pregame(&mut self) {
        let Some(snapshot) = self.fetch().await else {
            return;
        };

        if self.strategy.is_terminal(snapshot.status) {
            info!(game_id = %self.game_id, status = ?snapshot.status, "game over before going live");
            if let Err(err) = self.run_transition(LifecycleEvent::AlreadyFinished, no_work).await {
                self.transition_failed(err);
            }
            return;
        }

        if !matches!(snapshot.status, GameStatus::Imminent | GameStatus::Live) {
            debug!(game_id = %self.game_id, status = ?snapshot.status, "still waiting for pregame");
            return;
        }

        let Some(work) = self.open_channel(&snapshot).await else {
            return;
        };
        match self.run_transition(LifecycleEvent::GoLive, || work).await {
            Ok((channel, _)) => {
                self.preview_delivered();
                self.reconciler = Some(self.reconciler_for(channel, BackfillPolicy::AnnounceAll));
                self.last_snapshot = Some(snapshot);
            }
            Err(err) => self.transition_failed(err),
        }
    }

    async fn on_live(&mut self) {
        let Some(snapshot) = self.poll_reconciler().await else {
            return;
        };
        if !self.strategy.is_terminal(snapshot.status) {
            return;
        }

        let settle = self.strategy.settles();
        let work = self.post_work(self.strategy.render_final(&snapshot));
        match self
            .run_transition(LifecycleEvent::Finalize { settle }, || work)
            .await
        {
            Ok((_, GameSessionState::Settling)) => {
                self.settling_deadline = Some(Instant::now() + self.polling.settling_window);
            }
            Ok(_) => {}
            Err(err) => self.transition_failed(err),
        }
    }

    async fn on_settling(&mut self) {
        let snapshot = match self.poll_reconciler().await {
            Some(snapshot) => snapshot,
            None if self.phase().is_terminal() => return,
            None => match self.last_snapshot.clone() {
                Some(snapshot) => snapshot,
                None => return,
            },
        };

        let expired = self
            .settling_deadline
            .is_none_or(|deadline| Instant::now() >= deadline);
        if snapshot.summary.is_none() {
            if !expired {
                debug!(game_id = %self.game_id, "post-game summary not available yet");
                return;
            }
            info!(game_id = %self.game_id, "settling window expired without a summary");
        }

        let work = self.post_work(self.strategy.render_summary(&snapshot));
        if let Err(err) = self.run_transition(LifecycleEvent::Settle, || work).await {
            self.transition_failed(err);
        }
    }

    async fn fetch(&mut self) -> Option<GameSnapshot> {
        match self.feed.snapshot(&self.game_id).await {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                self.feed_failed(err).await;
                None
            }
        }
    }

    /// Run one reconciliation pass, returning the freshly fetched snapshot.
    async fn poll_reconciler(&mut self) -> Option<GameSnapshot> {
        let Some(reconciler) = self.reconciler.as_ref() else {
            self.fail("no reconciler in a reconciling phase".into()).await;
            return None;
        };

        match reconciler.poll(self.feed.as_ref()).await {
            Ok((snapshot, _report)) => {
                self.last_snapshot = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(err) => {
                self.feed_failed(err).await;
                None
            }
        }
    }

    async fn feed_failed(&mut self, err: FeedError) {
        if err.is_fatal() {
            self.fail(err.to_string()).await;
        } else {
            warn!(game_id = %self.game_id, phase = %self.phase(), error = %err, "feed poll failed; skipping tick");
        }
    }

    async fn fail(&mut self, reason: String) {
        error!(game_id = %self.game_id, phase = %self.phase(), %reason, "tracking stopped");
        if let Err(err) = self.run_transition(LifecycleEvent::Fail(reason), no_work).await {
            self.transition_failed(err);
        }
    }

    fn transition_failed(&self, err: ServiceError) {
        warn!(game_id = %self.game_id, phase = %self.phase(), error = %err, "transition aborted; retrying next tick");
    }

    fn reconciler_for(&self, channel: ChannelHandle, policy: BackfillPolicy) -> EventReconciler {
        EventReconciler::new(
            self.game_id.clone(),
            self.strategy.clone(),
            self.sink.clone(),
            channel,
            policy,
        )
    }

    /// Find or create the game's channel and return the work that posts the preview, if one
    /// is still owed.
    ///
    /// The channel is looked up once per controller. Only a channel that existed before that
    /// first lookup skips the preview, so a failed preview post is retried on the next tick.
    async fn open_channel(
        &mut self,
        snapshot: &GameSnapshot,
    ) -> Option<BoxFuture<'static, Result<ChannelHandle, ServiceError>>> {
        if self.channel.is_none() {
            let title = self.strategy.channel_title(snapshot);
            let lookup = match timeout(
                self.polling.transition_timeout,
                self.sink.ensure_channel(title),
            )
            .await
            {
                Ok(Ok(lookup)) => lookup,
                Ok(Err(err)) => {
                    self.transition_failed(err.into());
                    return None;
                }
                Err(_) => {
                    self.transition_failed(ServiceError::Timeout);
                    return None;
                }
            };
            if lookup.existed {
                info!(game_id = %self.game_id, channel = %lookup.handle, "channel already exists; preview not re-posted");
            }
            self.channel = Some(OpenedChannel {
                handle: lookup.handle,
                preview_pending: !lookup.existed,
            });
        }

        let opened = self.channel.as_ref()?;
        let handle = opened.handle.clone();
        let preview = opened
            .preview_pending
            .then(|| self.strategy.render_preview(snapshot));
        let sink = self.sink.clone();
        Some(Box::pin(async move {
            if let Some(preview) = preview {
                sink.post_content(handle.clone(), preview).await?;
            }
            Ok(handle)
        }))
    }

    fn preview_delivered(&mut self) {
        if let Some(opened) = self.channel.as_mut() {
            opened.preview_pending = false;
        }
    }

    fn post_work(
        &self,
        content: NotificationContent,
    ) -> BoxFuture<'static, Result<NotificationHandle, ServiceError>> {
        let sink = self.sink.clone();
        let channel = self
            .reconciler
            .as_ref()
            .map(|reconciler| reconciler.channel().clone());
        Box::pin(async move {
            let channel = channel
                .ok_or_else(|| ServiceError::InvalidState("no notification channel".into()))?;
            Ok(sink.post_content(channel, content).await?)
        })
    }

    /// Plan `event`, run its side effects under the transition timeout, then apply the plan.
    /// When the work fails or times out the plan is aborted and the phase is unchanged.
    async fn run_transition<F, Fut, T>(
        &mut self,
        event: LifecycleEvent,
        work: F,
    ) -> Result<(T, GameSessionState), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let Plan {
            id: plan_id, from, ..
        } = self.lifecycle.plan(event.clone())?;

        let outcome = match timeout(self.polling.transition_timeout, work()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout),
        };

        match outcome {
            Ok(value) => {
                let next = self.lifecycle.apply(plan_id)?;
                info!(game_id = %self.game_id, %from, to = %next, event = ?event, "lifecycle transition");
                self.history.push(TransitionRecord {
                    from,
                    to: next,
                    event,
                });
                self.phase_tx.send_replace(next);
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = self.lifecycle.abort(plan_id) {
                    warn!(
                        game_id = %self.game_id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                Err(err)
            }
        }
    }
}

async fn no_work() -> Result<(), ServiceError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::sport::{Baseball, Hockey},
        state::game::{PostGameSummary, StarPlayer},
        test_support::{RecordingSink, Scripted, ScriptedFeed, SinkCall, goal, snapshot},
    };

    fn polling() -> PollingConfig {
        PollingConfig {
            pregame: Duration::from_millis(20),
            live: Duration::from_millis(10),
            settling: Duration::from_millis(10),
            settling_window: Duration::from_secs(3600),
            discovery_hour_utc: 10,
            transition_timeout: Duration::from_secs(1),
        }
    }

    fn controller(
        strategy: Arc<dyn SportStrategy>,
        feed: &ScriptedFeed,
        sink: &RecordingSink,
        polling: PollingConfig,
    ) -> GameController {
        GameController::new(
            GameId::from("g1"),
            strategy,
            Arc::new(feed.clone()),
            Arc::new(sink.clone()),
            polling,
        )
    }

    async fn tick_until_terminal(controller: &mut GameController, max: usize) -> usize {
        for ticks in 1..=max {
            if controller.tick().await.is_terminal() {
                return ticks;
            }
        }
        panic!("controller did not finish within {max} ticks");
    }

    fn with_summary(mut snap: GameSnapshot) -> GameSnapshot {
        snap.summary = Some(PostGameSummary {
            stars: vec![StarPlayer {
                rank: 1,
                name: "A. Matthews".into(),
                team: "TOR".into(),
            }],
            series_status: None,
        });
        snap
    }

    #[tokio::test]
    async fn scheduled_to_final_scenario() {
        use GameStatus::*;
        let feed = ScriptedFeed::new();
        feed.statuses(
            "g1",
            &[Scheduled, Scheduled, Imminent, Live, Live, Final, Final],
        );
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Baseball), &feed, &sink, polling());

        let ticks = tick_until_terminal(&mut controller, 10).await;

        assert_eq!(ticks, 6);
        assert_eq!(controller.phase(), GameSessionState::Completed);
        assert_eq!(sink.count(|c| matches!(c, SinkCall::EnsureChannel(_))), 1);
        let posts = sink.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0], Baseball.render_preview(&snapshot("g1", Imminent, Vec::new())));
        assert_eq!(posts[1].title, "Final");

        let path: Vec<_> = controller
            .history()
            .iter()
            .map(|t| (t.from, t.to))
            .collect();
        assert_eq!(
            path,
            vec![
                (GameSessionState::Discovered, GameSessionState::PregameWatch),
                (GameSessionState::PregameWatch, GameSessionState::Live),
                (GameSessionState::Live, GameSessionState::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_game_errors_without_notifications() {
        let feed = ScriptedFeed::new();
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::Errored);
        assert!(sink.calls().is_empty());
        assert!(matches!(
            controller.history()[0].event,
            LifecycleEvent::Fail(_)
        ));
    }

    #[tokio::test]
    async fn not_found_while_live_errors() {
        let feed = ScriptedFeed::new();
        feed.script(
            "g1",
            vec![
                Scripted::Snapshot(snapshot("g1", GameStatus::Live, Vec::new())),
                Scripted::NotFound,
            ],
        );
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Errored);
    }

    #[tokio::test]
    async fn finished_game_completes_without_posting() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Final]);
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::Completed);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn postponed_during_pregame_completes() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Scheduled, GameStatus::Postponed]);
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::PregameWatch);
        assert_eq!(controller.tick().await, GameSessionState::Completed);
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn resume_into_existing_channel_skips_preview_and_history() {
        let live = |events| snapshot("g1", GameStatus::Live, events);
        let feed = ScriptedFeed::new();
        feed.script(
            "g1",
            vec![
                Scripted::Snapshot(live(vec![
                    goal("1", "A. Matthews", &[]),
                    goal("2", "W. Nylander", &[]),
                ])),
                Scripted::Snapshot(live(vec![
                    goal("1", "A. Matthews", &[]),
                    goal("2", "W. Nylander", &[]),
                    goal("3", "M. Marner", &[]),
                ])),
            ],
        );
        let sink = RecordingSink::new();
        sink.seed_channel(&Hockey.channel_title(&live(Vec::new())));
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert!(sink.posts().is_empty());
        assert_eq!(controller.history()[0].event, LifecycleEvent::Resume);

        controller.tick().await;
        let posts = sink.posts();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].body.contains("M. Marner"));
    }

    #[tokio::test]
    async fn resume_into_new_channel_posts_preview_only() {
        let feed = ScriptedFeed::new();
        feed.script(
            "g1",
            vec![Scripted::Snapshot(snapshot(
                "g1",
                GameStatus::Live,
                vec![goal("1", "A. Matthews", &[])],
            ))],
        );
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        controller.tick().await;

        let posts = sink.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].body, "Puck drop is imminent.");
    }

    #[tokio::test]
    async fn failed_preview_is_posted_on_retry() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Scheduled, GameStatus::Imminent]);
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::PregameWatch);
        sink.fail_next_posts(1);
        assert_eq!(controller.tick().await, GameSessionState::PregameWatch);
        assert_eq!(controller.tick().await, GameSessionState::Live);

        let preview = Hockey.render_preview(&snapshot("g1", GameStatus::Imminent, Vec::new()));
        assert_eq!(sink.count(|c| matches!(c, SinkCall::EnsureChannel(_))), 1);
        assert_eq!(sink.posts(), vec![preview.clone(), preview]);
    }

    #[tokio::test]
    async fn failed_preview_on_resume_is_posted_on_retry() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Live]);
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());
        sink.fail_next_posts(1);

        assert_eq!(controller.tick().await, GameSessionState::Discovered);
        assert_eq!(controller.tick().await, GameSessionState::Live);

        assert_eq!(controller.history().len(), 1);
        assert_eq!(sink.posts().len(), 2);
        assert_eq!(sink.posts()[1].body, "Puck drop is imminent.");
    }

    #[tokio::test]
    async fn hockey_settles_on_summary() {
        let feed = ScriptedFeed::new();
        feed.script(
            "g1",
            vec![
                Scripted::Snapshot(snapshot("g1", GameStatus::Imminent, Vec::new())),
                Scripted::Snapshot(snapshot("g1", GameStatus::Imminent, Vec::new())),
                Scripted::Snapshot(snapshot("g1", GameStatus::Final, Vec::new())),
                Scripted::Snapshot(snapshot("g1", GameStatus::Final, Vec::new())),
                Scripted::Snapshot(with_summary(snapshot("g1", GameStatus::Final, Vec::new()))),
            ],
        );
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::PregameWatch);
        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Settling);
        assert_eq!(controller.tick().await, GameSessionState::Settling);
        assert_eq!(controller.tick().await, GameSessionState::Completed);

        let titles: Vec<_> = sink.posts().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["Maple Leafs at Canadiens", "Final", "Three stars"]);
        assert!(sink.posts()[2].body.contains("1st star: A. Matthews (TOR)"));
    }

    #[tokio::test]
    async fn settling_window_expiry_posts_fallback_summary() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Live, GameStatus::Final]);
        let sink = RecordingSink::new();
        let polling = PollingConfig {
            settling_window: Duration::ZERO,
            ..polling()
        };
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling);

        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Settling);
        assert_eq!(controller.tick().await, GameSessionState::Completed);

        let last = sink.posts().pop().unwrap();
        assert_eq!(last.body, "Three stars were not announced.");
    }

    #[tokio::test]
    async fn transient_failures_skip_the_tick() {
        let feed = ScriptedFeed::new();
        feed.script(
            "g1",
            vec![
                Scripted::Transient,
                Scripted::Snapshot(snapshot("g1", GameStatus::Live, Vec::new())),
                Scripted::Transient,
                Scripted::Snapshot(snapshot("g1", GameStatus::Live, Vec::new())),
            ],
        );
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Hockey), &feed, &sink, polling());

        assert_eq!(controller.tick().await, GameSessionState::Discovered);
        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Live);
    }

    #[tokio::test]
    async fn failed_final_post_is_retried() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Live, GameStatus::Final]);
        let sink = RecordingSink::new();
        let mut controller = controller(Arc::new(Baseball), &feed, &sink, polling());

        controller.tick().await;
        sink.fail_next_posts(1);

        assert_eq!(controller.tick().await, GameSessionState::Live);
        assert_eq!(controller.tick().await, GameSessionState::Completed);
        assert_eq!(sink.count(|c| matches!(c, SinkCall::Post(..))), 3);
        assert_eq!(sink.posts().pop().unwrap().title, "Final");
    }

    #[tokio::test]
    async fn stop_signal_completes_and_reports_exit() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Scheduled]);
        let sink = RecordingSink::new();
        let polling = PollingConfig {
            pregame: Duration::from_secs(3600),
            ..polling()
        };
        let controller = controller(Arc::new(Hockey), &feed, &sink, polling);
        let instance = controller.instance();
        let mut phase = controller.phase_watcher();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(controller.run(stop_rx, exit_tx));
        phase
            .wait_for(|p| *p == GameSessionState::PregameWatch)
            .await
            .unwrap();
        stop_tx.send(true).unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(1), exit_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            exit,
            ControllerExit {
                game_id: GameId::from("g1"),
                instance,
                state: GameSessionState::Completed,
            }
        );
        task.await.unwrap();
    }

    #[tokio::test]
    async fn run_loop_reports_natural_completion() {
        let feed = ScriptedFeed::new();
        feed.statuses("g1", &[GameStatus::Live, GameStatus::Final]);
        let sink = RecordingSink::new();
        let controller = controller(Arc::new(Baseball), &feed, &sink, polling());
        let (_stop_tx, stop_rx) = watch::channel(false);
        let (exit_tx, mut exit_rx) = mpsc::unbounded_channel();

        tokio::spawn(controller.run(stop_rx, exit_tx));

        let exit = tokio::time::timeout(Duration::from_secs(2), exit_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.state, GameSessionState::Completed);
        assert_eq!(sink.posts().last().unwrap().title, "Final");
    }
}
