use std::{fmt, time::Instant};

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Phases a tracked game goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameSessionState {
    /// Controller created; nothing observed yet.
    Discovered,
    /// Waiting for the game to become imminent.
    PregameWatch,
    /// Reconciling events at high frequency.
    Live,
    /// Game over; waiting for the post-game summary.
    Settling,
    /// Finished normally, or stopped by an operator.
    Completed,
    /// Stopped on an unrecoverable error.
    Errored,
}

impl GameSessionState {
    /// Whether no further transition can leave this phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }
}

impl fmt::Display for GameSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Discovered => "discovered",
            Self::PregameWatch => "pregame_watch",
            Self::Live => "live",
            Self::Settling => "settling",
            Self::Completed => "completed",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// Events that can be applied to the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// First observation found the game not yet started.
    Watch,
    /// Pregame watch observed the game becoming imminent or live.
    GoLive,
    /// First observation found the game already in progress.
    Resume,
    /// Live tracking observed a terminal status.
    Finalize {
        /// Whether a settling phase follows.
        settle: bool,
    },
    /// The post-game summary arrived or the settling window expired.
    Settle,
    /// The game was already over before live tracking began.
    AlreadyFinished,
    /// An operator stopped tracking.
    Stop,
    /// Unrecoverable failure.
    Fail(String),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from}")]
pub struct InvalidTransition {
    /// Phase the lifecycle was in when the event was received.
    pub from: GameSessionState,
    /// Rejected event.
    pub event: LifecycleEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Id of the pending plan.
        expected: PlanId,
        /// Id that was supplied.
        got: PlanId,
    },
    /// Phase changed since the plan was created.
    PhaseMismatch {
        /// Phase recorded in the plan.
        expected: GameSessionState,
        /// Phase found when applying.
        actual: GameSessionState,
    },
    /// Version changed since the plan was created.
    VersionMismatch {
        /// Version recorded in the plan.
        expected: usize,
        /// Version found when applying.
        actual: usize,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Id of the pending plan.
        expected: PlanId,
        /// Id that was supplied.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the lifecycle is in.
    pub from: GameSessionState,
    /// Phase the lifecycle moves to on apply.
    pub to: GameSessionState,
    /// Event that triggered the transition.
    pub event: LifecycleEvent,
    /// Version after applying.
    pub version_next: usize,
    /// When the plan was created.
    pub pending_since: Instant,
}

/// Lifecycle of one tracked game.
#[derive(Debug, Clone)]
pub struct GameLifecycle {
    phase: GameSessionState,
    version: usize,
    pending: Option<Plan>,
}

impl Default for GameLifecycle {
    fn default() -> Self {
        Self {
            phase: GameSessionState::Discovered,
            version: 0,
            pending: None,
        }
    }
}

impl GameLifecycle {
    /// Create a lifecycle in the `Discovered` phase.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GameSessionState {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Target phase of the pending plan, if any.
    pub fn pending(&self) -> Option<GameSessionState> {
        self.pending.as_ref().map(|plan| plan.to)
    }

    /// Validate `event` against the current phase and reserve the transition.
    pub fn plan(&mut self, event: LifecycleEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(&event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply the pending plan, returning the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GameSessionState, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;

        Ok(self.phase)
    }

    /// Drop the pending plan, leaving the phase unchanged.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(
        &self,
        event: &LifecycleEvent,
    ) -> Result<GameSessionState, InvalidTransition> {
        use GameSessionState as S;
        use LifecycleEvent as E;

        let next = match (self.phase, event) {
            (from, _) if from.is_terminal() => None,
            (S::Discovered, E::Watch) => Some(S::PregameWatch),
            (S::Discovered, E::Resume) => Some(S::Live),
            (S::Discovered | S::PregameWatch, E::AlreadyFinished) => Some(S::Completed),
            (S::PregameWatch, E::GoLive) => Some(S::Live),
            (S::Live, E::Finalize { settle: true }) => Some(S::Settling),
            (S::Live, E::Finalize { settle: false }) => Some(S::Completed),
            (S::Settling, E::Settle) => Some(S::Completed),
            (_, E::Stop) => Some(S::Completed),
            (_, E::Fail(_)) => Some(S::Errored),
            _ => None,
        };

        next.ok_or_else(|| InvalidTransition {
            from: self.phase,
            event: event.clone(),
        })
    }
}
