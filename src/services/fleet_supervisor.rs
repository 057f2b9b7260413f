//! Process-wide owner of which games are tracked.
//!
//! The registry maps each game to its running controller. Controllers are only ever removed
//! by the reaper, when their own exit message arrives; `stop_game` merely asks a controller
//! to stop.

use std::{
    collections::BTreeSet,
    sync::{
        Arc, Mutex as StdMutex, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use time::{OffsetDateTime, Time};
use tokio::{
    sync::{Mutex, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::PollingConfig,
    dao::{feed::FeedSource, sink::NotificationSink, tracked_games::TrackedGameStore},
    error::ServiceError,
    services::{
        controller::{ControllerExit, GameController},
        sport::SportStrategy,
    },
    state::{
        game::{GameId, TeamId},
        lifecycle::GameSessionState,
    },
};

/// Registry entry of a running controller.
struct ControllerHandle {
    instance: Uuid,
    stop: watch::Sender<bool>,
    phase: watch::Receiver<GameSessionState>,
}

/// A tracked game as seen by operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedGame {
    pub game_id: GameId,
    /// `None` when the id is in the manual set but no controller runs for it.
    pub phase: Option<GameSessionState>,
    pub manual: bool,
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Controllers created by this pass.
    pub started: usize,
    /// Candidates that already had a controller.
    pub already_active: usize,
    /// Set when no favorite team is configured.
    pub manual_only: bool,
}

/// Collaborators shared by every controller.
pub struct SupervisorDeps {
    pub strategy: Arc<dyn SportStrategy>,
    pub feed: Arc<dyn FeedSource>,
    pub sink: Arc<dyn NotificationSink>,
    pub store: Arc<dyn TrackedGameStore>,
}

/// Owns the controller registry and the manually tracked id set.
pub struct FleetSupervisor {
    deps: SupervisorDeps,
    favorite_team: Option<TeamId>,
    polling: PollingConfig,
    registry: DashMap<GameId, ControllerHandle>,
    manual: Mutex<BTreeSet<GameId>>,
    exits: mpsc::UnboundedSender<ControllerExit>,
    background: StdMutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl FleetSupervisor {
    /// Build the supervisor and start its reaper task.
    pub fn new(
        deps: SupervisorDeps,
        favorite_team: Option<TeamId>,
        polling: PollingConfig,
    ) -> Arc<Self> {
        let (exits, exits_rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(Self {
            deps,
            favorite_team,
            polling,
            registry: DashMap::new(),
            manual: Mutex::new(BTreeSet::new()),
            exits,
            background: StdMutex::new(Vec::new()),
            shutting_down: AtomicBool::new(false),
        });

        let reaper = tokio::spawn(reap_exits(Arc::downgrade(&supervisor), exits_rx));
        supervisor.keep_background(reaper);
        supervisor
    }

    /// Load the manual set, run one discovery pass and arm the daily discovery timer.
    pub async fn initialize(self: &Arc<Self>) {
        match self.deps.store.load().await {
            Ok(ids) => {
                info!(count = ids.len(), "loaded manually tracked games");
                *self.manual.lock().await = ids;
            }
            Err(err) => {
                warn!(error = %err, "failed to load manually tracked games; starting empty");
            }
        }

        if let Err(err) = self.discovery_pass().await {
            warn!(error = %err, "initial discovery pass failed");
        }

        let hour = self.polling.discovery_hour_utc;
        let timer = tokio::spawn(run_daily_discovery(Arc::downgrade(self), hour));
        self.keep_background(timer);
        info!(hour_utc = hour, "daily discovery armed");
    }

    /// Start tracking `game_id` on an operator's request.
    ///
    /// Returns `false` when the game is already tracked, either manually or by a controller.
    pub async fn track_game_by_id(&self, game_id: GameId) -> Result<bool, ServiceError> {
        if game_id.as_str().trim().is_empty() {
            return Err(ServiceError::InvalidInput("game id must not be empty".into()));
        }
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(ServiceError::InvalidState("supervisor is shutting down".into()));
        }

        let mut manual = self.manual.lock().await;
        if manual.contains(&game_id) || self.registry.contains_key(&game_id) {
            debug!(%game_id, "game already tracked");
            return Ok(false);
        }

        manual.insert(game_id.clone());
        if let Err(err) = self.deps.store.save(manual.clone()).await {
            manual.remove(&game_id);
            return Err(err.into());
        }
        drop(manual);

        info!(%game_id, "manually tracking game");
        self.spawn_controller(game_id);
        Ok(true)
    }

    /// Ask the controller of `game_id` to stop. Deregistration follows its exit.
    pub async fn stop_game(&self, game_id: &GameId) -> Result<(), ServiceError> {
        if let Some(handle) = self.registry.get(game_id) {
            info!(%game_id, "stop requested");
            // A closed channel means the controller already exited.
            let _ = handle.stop.send(true);
            return Ok(());
        }

        let mut manual = self.manual.lock().await;
        if !manual.remove(game_id) {
            return Err(ServiceError::NotFound(format!("game `{game_id}` is not tracked")));
        }
        if let Err(err) = self.deps.store.save(manual.clone()).await {
            manual.insert(game_id.clone());
            return Err(err.into());
        }
        info!(%game_id, "removed idle game from manual set");
        Ok(())
    }

    /// Create a controller for every game of the day involving the favorite team, plus every
    /// manually tracked game, unless one is already running.
    pub async fn discovery_pass(&self) -> Result<DiscoveryReport, ServiceError> {
        let mut report = DiscoveryReport::default();
        let mut candidates = self.manual.lock().await.clone();

        let feed_result = match self.favorite_team {
            Some(team) => match self.deps.feed.daily_game_ids(Some(team)).await {
                Ok(ids) => {
                    candidates.extend(ids);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            None => {
                let err = ServiceError::Configuration("no favorite team configured".into());
                warn!(error = %err, "discovery limited to manually tracked games");
                report.manual_only = true;
                Ok(())
            }
        };

        for game_id in candidates {
            if self.spawn_controller(game_id) {
                report.started += 1;
            } else {
                report.already_active += 1;
            }
        }

        info!(
            started = report.started,
            already_active = report.already_active,
            manual_only = report.manual_only,
            "discovery pass finished"
        );
        feed_result?;
        Ok(report)
    }

    /// Stop every controller and clear the registry. In-flight passes are not awaited and
    /// the manual set is left as persisted.
    pub fn stop_all(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);

        if let Ok(mut background) = self.background.lock() {
            for task in background.drain(..) {
                task.abort();
            }
        }

        for entry in self.registry.iter() {
            let _ = entry.stop.send(true);
        }
        let count = self.registry.len();
        self.registry.clear();
        info!(count, "stopped all controllers");
    }

    /// Snapshot of tracked games, ordered by id.
    pub async fn tracked_games(&self) -> Vec<TrackedGame> {
        let manual = self.manual.lock().await.clone();
        let mut games: Vec<TrackedGame> = self
            .registry
            .iter()
            .map(|entry| TrackedGame {
                game_id: entry.key().clone(),
                phase: Some(*entry.phase.borrow()),
                manual: manual.contains(entry.key()),
            })
            .collect();

        for game_id in manual {
            if !self.registry.contains_key(&game_id) {
                games.push(TrackedGame {
                    game_id,
                    phase: None,
                    manual: true,
                });
            }
        }

        games.sort_by(|a, b| a.game_id.cmp(&b.game_id));
        games
    }

    /// Number of running controllers.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    pub fn favorite_team(&self) -> Option<TeamId> {
        self.favorite_team
    }

    /// Register and spawn a controller unless one already exists for `game_id`.
    fn spawn_controller(&self, game_id: GameId) -> bool {
        let task = match self.registry.entry(game_id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                let controller = GameController::new(
                    game_id.clone(),
                    self.deps.strategy.clone(),
                    self.deps.feed.clone(),
                    self.deps.sink.clone(),
                    self.polling,
                );
                let (stop, stop_rx) = watch::channel(false);
                slot.insert(ControllerHandle {
                    instance: controller.instance(),
                    stop,
                    phase: controller.phase_watcher(),
                });
                controller.run(stop_rx, self.exits.clone())
            }
        };

        tokio::spawn(task);
        info!(%game_id, "controller started");
        true
    }

    async fn on_exit(&self, exit: ControllerExit) {
        let removed = self
            .registry
            .remove_if(&exit.game_id, |_, handle| handle.instance == exit.instance)
            .is_some();
        if !removed {
            debug!(game_id = %exit.game_id, instance = %exit.instance, "ignoring exit of a replaced controller");
            return;
        }
        info!(game_id = %exit.game_id, state = %exit.state, "controller finished; deregistered");

        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        let mut manual = self.manual.lock().await;
        if manual.remove(&exit.game_id) {
            if let Err(err) = self.deps.store.save(manual.clone()).await {
                warn!(game_id = %exit.game_id, error = %err, "failed to persist manual set");
            }
        }
    }

    fn keep_background(&self, task: JoinHandle<()>) {
        match self.background.lock() {
            Ok(mut background) => background.push(task),
            Err(_) => warn!("background task list poisoned; task left detached"),
        }
    }
}

async fn reap_exits(
    supervisor: Weak<FleetSupervisor>,
    mut exits: mpsc::UnboundedReceiver<ControllerExit>,
) {
    while let Some(exit) = exits.recv().await {
        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        supervisor.on_exit(exit).await;
    }
}

async fn run_daily_discovery(supervisor: Weak<FleetSupervisor>, hour_utc: u8) {
    loop {
        let delay = delay_until_hour(OffsetDateTime::now_utc(), hour_utc);
        debug!(?delay, "next discovery pass scheduled");
        tokio::time::sleep(delay).await;

        let Some(supervisor) = supervisor.upgrade() else {
            break;
        };
        if let Err(err) = supervisor.discovery_pass().await {
            warn!(error = %err, "daily discovery pass failed");
        }
    }
}

/// Time left until the next occurrence of `hour_utc:00`, strictly in the future.
fn delay_until_hour(now: OffsetDateTime, hour_utc: u8) -> Duration {
    let at = Time::from_hms(hour_utc, 0, 0).unwrap_or(Time::MIDNIGHT);
    let mut next = now.replace_time(at);
    if next <= now {
        next += time::Duration::days(1);
    }
    Duration::try_from(next - now).unwrap_or(Duration::from_secs(24 * 60 * 60))
}
