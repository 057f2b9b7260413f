pub mod game;
pub mod lifecycle;
mod sse;

use std::sync::Arc;

use crate::services::fleet_supervisor::FleetSupervisor;

pub use self::sse::SseHub;

pub type SharedState = Arc<AppState>;

/// Central application state shared by the HTTP handlers.
pub struct AppState {
    supervisor: Arc<FleetSupervisor>,
    notifications: SseHub,
    admin_token: Option<String>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        supervisor: Arc<FleetSupervisor>,
        notifications: SseHub,
        admin_token: Option<String>,
    ) -> SharedState {
        Arc::new(Self {
            supervisor,
            notifications,
            admin_token,
        })
    }

    /// Owner of the tracked games.
    pub fn supervisor(&self) -> &Arc<FleetSupervisor> {
        &self.supervisor
    }

    /// Broadcast hub fed by the notification sink.
    pub fn notifications(&self) -> &SseHub {
        &self.notifications
    }

    /// Token required on admin routes; `None` leaves them open.
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }
}
