use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::sink::{ChannelHandle, NotificationContent, NotificationHandle};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Build an event from raw data.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a game channel is created.
pub struct ChannelCreatedEvent {
    pub channel: ChannelHandle,
    pub title: String,
    pub at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a notification is posted or edited.
pub struct NotificationEvent {
    pub handle: NotificationHandle,
    pub content: NotificationContent,
    pub at: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a notification is retracted.
pub struct NotificationDeletedEvent {
    pub handle: NotificationHandle,
    pub at: String,
}
