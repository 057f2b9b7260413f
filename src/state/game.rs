use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Identifier of one game in the feed source's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    /// Wrap a raw feed identifier.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for GameId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a feed event, unique within a game.
pub type EventId = String;

/// Identifier of a team in the feed source's namespace.
pub type TeamId = u32;

/// Coarse game status as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Scheduled for later today (or later).
    Scheduled,
    /// Warmups / pregame: the game is about to start.
    Imminent,
    /// In progress.
    Live,
    /// Finished; the final score is known.
    Final,
    /// Postponed or cancelled; the game will not be played today.
    Postponed,
}

impl GameStatus {
    /// Whether the game can no longer produce live events.
    pub fn is_over(self) -> bool {
        matches!(self, GameStatus::Final | GameStatus::Postponed)
    }
}

/// Team participating in a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub abbrev: String,
    pub name: String,
}

/// Running score, home and away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub away: u32,
    pub home: u32,
}

/// Game clock: period (or inning), time remaining, intermission flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    pub period: u32,
    #[serde(default)]
    pub time_remaining: Option<String>,
    #[serde(default)]
    pub in_break: bool,
}

/// Post-game summary published some time after the final whistle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostGameSummary {
    #[serde(default)]
    pub stars: Vec<StarPlayer>,
    #[serde(default)]
    pub series_status: Option<String>,
}

/// One of the game's selected stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarPlayer {
    pub rank: u8,
    pub name: String,
    pub team: String,
}

/// Point-in-time read of a game. Superseded wholesale by the next poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: GameId,
    pub status: GameStatus,
    pub away: TeamInfo,
    pub home: TeamInfo,
    #[serde(default)]
    pub clock: GameClock,
    #[serde(default)]
    pub score: Score,
    #[serde(default)]
    pub events: Vec<FeedEvent>,
    /// Only present once the feed has published it, which may lag the final status.
    #[serde(default)]
    pub summary: Option<PostGameSummary>,
}

impl GameSnapshot {
    /// Whether `team` plays in this game.
    pub fn involves(&self, team: TeamId) -> bool {
        self.home.id == team || self.away.id == team
    }
}

/// One notable occurrence reported by the feed.
///
/// The feed may revise the payload of an event (an assist added to a goal) but never reuses an
/// id for a different occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: EventId,
    /// Feed-assigned ordering key.
    pub sequence: u64,
    pub payload: EventPayload,
}

impl FeedEvent {
    /// Coarse classification used by the per-sport notability predicates.
    pub fn kind(&self) -> EventKind {
        self.payload.detail.kind()
    }

    /// Seconds elapsed in the event's period, parsed from `MM:SS`.
    pub fn elapsed_in_period(&self) -> u32 {
        parse_clock(&self.payload.time_in_period).unwrap_or(0)
    }
}

/// Everything about an event that is rendered, and therefore compared between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub period: u32,
    #[serde(default)]
    pub time_in_period: String,
    pub detail: EventDetail,
}

/// Kind-specific event data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDetail {
    Goal(GoalDetail),
    Penalty(PenaltyDetail),
    PeriodStart,
    PeriodEnd,
    ScoringPlay(PlayDetail),
    PitchingChange(PlayDetail),
    Other { description: String },
}

impl EventDetail {
    fn kind(&self) -> EventKind {
        match self {
            EventDetail::Goal(_) => EventKind::Goal,
            EventDetail::Penalty(_) => EventKind::Penalty,
            EventDetail::PeriodStart | EventDetail::PeriodEnd => EventKind::PeriodBoundary,
            EventDetail::ScoringPlay(_) => EventKind::ScoringPlay,
            EventDetail::PitchingChange(_) => EventKind::PitchingChange,
            EventDetail::Other { .. } => EventKind::Other,
        }
    }
}

/// Coarse event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Goal,
    Penalty,
    PeriodBoundary,
    ScoringPlay,
    PitchingChange,
    Other,
}

/// Hockey goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalDetail {
    pub team: String,
    pub scorer: String,
    #[serde(default)]
    pub assists: Vec<String>,
    #[serde(default)]
    pub shot_type: Option<String>,
    pub score_after: Score,
}

/// Hockey penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyDetail {
    pub team: String,
    pub player: Option<String>,
    pub infraction: String,
    pub minutes: u32,
}

/// Free-form play (baseball scoring plays, pitching changes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayDetail {
    pub team: String,
    pub description: String,
    #[serde(default)]
    pub score_after: Option<Score>,
}

/// Parse a `MM:SS` clock string into seconds. Values that do not fit a `u32` yield `None`.
pub fn parse_clock(value: &str) -> Option<u32> {
    let (minutes, seconds) = value.split_once(':')?;
    let minutes: u32 = minutes.trim().parse().ok()?;
    let seconds: u32 = seconds.trim().parse().ok()?;
    minutes.checked_mul(60)?.checked_add(seconds)
}
