//! Scripted collaborators shared by the unit tests.

use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::BoxFuture;

use crate::{
    dao::{
        feed::{FeedError, FeedResult, FeedSource},
        sink::{
            ChannelHandle, ChannelLookup, NotificationContent, NotificationHandle,
            NotificationSink, SinkError, SinkResult,
        },
        storage::StorageResult,
        tracked_games::TrackedGameStore,
    },
    state::game::{
        EventDetail, EventPayload, FeedEvent, GameClock, GameId, GameSnapshot, GameStatus,
        GoalDetail, PenaltyDetail, Score, TeamId, TeamInfo,
    },
};

pub const AWAY_TEAM: TeamId = 10;
pub const HOME_TEAM: TeamId = 8;

pub fn snapshot(game_id: &str, status: GameStatus, events: Vec<FeedEvent>) -> GameSnapshot {
    GameSnapshot {
        game_id: GameId::from(game_id),
        status,
        away: TeamInfo {
            id: AWAY_TEAM,
            abbrev: "TOR".into(),
            name: "Maple Leafs".into(),
        },
        home: TeamInfo {
            id: HOME_TEAM,
            abbrev: "MTL".into(),
            name: "Canadiens".into(),
        },
        clock: GameClock::default(),
        score: Score::default(),
        events,
        summary: None,
    }
}

pub fn goal(id: &str, scorer: &str, assists: &[&str]) -> FeedEvent {
    FeedEvent {
        id: id.into(),
        sequence: id.parse().unwrap_or(0),
        payload: EventPayload {
            period: 1,
            time_in_period: "05:00".into(),
            detail: EventDetail::Goal(GoalDetail {
                team: "TOR".into(),
                scorer: scorer.into(),
                assists: assists.iter().map(|a| a.to_string()).collect(),
                shot_type: None,
                score_after: Score { away: 1, home: 0 },
            }),
        },
    }
}

pub fn penalty(id: &str, period: u32, time: &str) -> FeedEvent {
    FeedEvent {
        id: id.into(),
        sequence: id.parse().unwrap_or(0),
        payload: EventPayload {
            period,
            time_in_period: time.into(),
            detail: EventDetail::Penalty(PenaltyDetail {
                team: "MTL".into(),
                player: Some("N. Suzuki".into()),
                infraction: "tripping".into(),
                minutes: 2,
            }),
        },
    }
}

pub fn shot(id: &str) -> FeedEvent {
    FeedEvent {
        id: id.into(),
        sequence: id.parse().unwrap_or(0),
        payload: EventPayload {
            period: 1,
            time_in_period: "01:00".into(),
            detail: EventDetail::Other {
                description: "shot on goal".into(),
            },
        },
    }
}

/// One scripted answer of [`ScriptedFeed::snapshot`].
#[derive(Clone)]
pub enum Scripted {
    Snapshot(GameSnapshot),
    NotFound,
    Transient,
}

#[derive(Default)]
struct FeedScript {
    games: HashMap<GameId, VecDeque<Scripted>>,
    daily: Vec<GameId>,
}

/// Feed replaying a scripted sequence per game; the last answer repeats forever.
#[derive(Clone, Default)]
pub struct ScriptedFeed {
    script: Arc<Mutex<FeedScript>>,
    delay: Option<Duration>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(&self, game_id: &str, answers: Vec<Scripted>) {
        let mut script = self.script.lock().unwrap();
        script
            .games
            .insert(GameId::from(game_id), answers.into_iter().collect());
    }

    pub fn statuses(&self, game_id: &str, statuses: &[GameStatus]) {
        self.script(
            game_id,
            statuses
                .iter()
                .map(|status| Scripted::Snapshot(snapshot(game_id, *status, Vec::new())))
                .collect(),
        );
    }

    pub fn set_daily(&self, ids: &[&str]) {
        self.script.lock().unwrap().daily = ids.iter().map(|id| GameId::from(*id)).collect();
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn next(&self, game_id: &GameId) -> Scripted {
        let mut script = self.script.lock().unwrap();
        let Some(queue) = script.games.get_mut(game_id) else {
            return Scripted::NotFound;
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Scripted::NotFound)
        } else {
            queue.front().cloned().unwrap_or(Scripted::NotFound)
        }
    }
}

impl FeedSource for ScriptedFeed {
    fn snapshot(&self, game_id: &GameId) -> BoxFuture<'static, FeedResult<GameSnapshot>> {
        let this = self.clone();
        let game_id = game_id.clone();
        Box::pin(async move {
            this.log.lock().unwrap().push(format!("fetch:start:{game_id}"));
            if let Some(delay) = this.delay {
                tokio::time::sleep(delay).await;
            }
            let answer = this.next(&game_id);
            this.log.lock().unwrap().push(format!("fetch:end:{game_id}"));
            match answer {
                Scripted::Snapshot(snapshot) => Ok(snapshot),
                Scripted::NotFound => Err(FeedError::NotFound { game_id }),
                Scripted::Transient => Err(FeedError::Transient {
                    message: "scripted outage".into(),
                    source: None,
                }),
            }
        })
    }

    fn daily_game_ids(
        &self,
        _favorite: Option<TeamId>,
    ) -> BoxFuture<'static, FeedResult<Vec<GameId>>> {
        let daily = self.script.lock().unwrap().daily.clone();
        Box::pin(async move { Ok(daily) })
    }
}

/// One call observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    EnsureChannel(String),
    Post(ChannelHandle, NotificationContent),
    Edit(NotificationHandle, NotificationContent),
    Delete(NotificationHandle),
}

#[derive(Default)]
struct SinkBook {
    calls: Vec<SinkCall>,
    channels: HashMap<String, ChannelHandle>,
    next_id: u64,
    fail_posts: usize,
    gone: HashSet<NotificationHandle>,
}

/// Sink recording every call, with knobs to inject failures.
#[derive(Clone, Default)]
pub struct RecordingSink {
    book: Arc<Mutex<SinkBook>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.book.lock().unwrap().calls.clone()
    }

    pub fn posts(&self) -> Vec<NotificationContent> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Post(_, content) => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&SinkCall) -> bool) -> usize {
        self.calls().iter().filter(|call| pred(call)).count()
    }

    /// Pre-create a channel as if it survived a restart.
    pub fn seed_channel(&self, title: &str) {
        let mut book = self.book.lock().unwrap();
        book.channels
            .insert(title.to_string(), ChannelHandle(format!("ch-{title}")));
    }

    /// Make the next `n` posts fail.
    pub fn fail_next_posts(&self, n: usize) {
        self.book.lock().unwrap().fail_posts = n;
    }

    /// Pretend `handle` was deleted out-of-band.
    pub fn vanish(&self, handle: &NotificationHandle) {
        self.book.lock().unwrap().gone.insert(handle.clone());
    }
}

impl NotificationSink for RecordingSink {
    fn ensure_channel(&self, title: String) -> BoxFuture<'static, SinkResult<ChannelLookup>> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(SinkCall::EnsureChannel(title.clone()));
        let existed = book.channels.contains_key(&title);
        let handle = book
            .channels
            .entry(title.clone())
            .or_insert_with(|| ChannelHandle(format!("ch-{title}")))
            .clone();
        Box::pin(async move { Ok(ChannelLookup { handle, existed }) })
    }

    fn post_content(
        &self,
        channel: ChannelHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(SinkCall::Post(channel.clone(), content));
        let result = if book.fail_posts > 0 {
            book.fail_posts -= 1;
            Err(SinkError::unavailable("scripted post failure"))
        } else {
            book.next_id += 1;
            Ok(NotificationHandle {
                channel,
                message_id: book.next_id.to_string(),
            })
        };
        Box::pin(async move { result })
    }

    fn edit_content(
        &self,
        handle: NotificationHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(SinkCall::Edit(handle.clone(), content));
        let result = if book.gone.contains(&handle) {
            Err(SinkError::HandleGone {
                handle: handle.to_string(),
            })
        } else {
            Ok(handle)
        };
        Box::pin(async move { result })
    }

    fn delete_content(&self, handle: NotificationHandle) -> BoxFuture<'static, SinkResult<()>> {
        let mut book = self.book.lock().unwrap();
        book.calls.push(SinkCall::Delete(handle.clone()));
        let result = if book.gone.contains(&handle) {
            Err(SinkError::HandleGone {
                handle: handle.to_string(),
            })
        } else {
            Ok(())
        };
        Box::pin(async move { result })
    }
}

/// In-memory [`TrackedGameStore`] counting saves.
#[derive(Clone, Default)]
pub struct MemoryStore {
    ids: Arc<Mutex<BTreeSet<GameId>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStore {
    pub fn with_ids(ids: &[&str]) -> Self {
        let store = Self::default();
        *store.ids.lock().unwrap() = ids.iter().map(|id| GameId::from(*id)).collect();
        store
    }

    pub fn ids(&self) -> BTreeSet<GameId> {
        self.ids.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl TrackedGameStore for MemoryStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<BTreeSet<GameId>>> {
        let ids = self.ids();
        Box::pin(async move { Ok(ids) })
    }

    fn save(&self, ids: BTreeSet<GameId>) -> BoxFuture<'static, StorageResult<()>> {
        *self.ids.lock().unwrap() = ids;
        *self.saves.lock().unwrap() += 1;
        Box::pin(async move { Ok(()) })
    }
}
