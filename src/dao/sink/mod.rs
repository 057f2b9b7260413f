//! Outbound notification channels.

mod broadcast;

use std::{error::Error, fmt};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use self::broadcast::BroadcastSink;

/// Result alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Failures surfaced by a notification sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The message or channel was removed out-of-band; callers treat this as a no-op.
    #[error("notification handle `{handle}` no longer exists")]
    HandleGone { handle: String },
    /// The sink could not perform the operation.
    #[error("notification sink unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<Box<dyn Error + Send + Sync>>,
    },
}

impl SinkError {
    /// Build an unavailable error without an underlying source.
    pub fn unavailable(message: impl Into<String>) -> Self {
        SinkError::Unavailable {
            message: message.into(),
            source: None,
        }
    }
}

/// Dedicated sub-channel ("thread") of one game.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ChannelHandle(pub String);

impl fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A posted notification that can later be edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct NotificationHandle {
    pub channel: ChannelHandle,
    pub message_id: String,
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.message_id)
    }
}

/// Rendered, human-readable notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Outcome of [`NotificationSink::ensure_channel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLookup {
    pub handle: ChannelHandle,
    /// `true` when the channel was already there (for example after a restart).
    pub existed: bool,
}

/// Creates, edits and deletes persistent notifications.
pub trait NotificationSink: Send + Sync {
    /// Find or create the channel titled `title`. Idempotent by title.
    fn ensure_channel(&self, title: String) -> BoxFuture<'static, SinkResult<ChannelLookup>>;

    fn post_content(
        &self,
        channel: ChannelHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>>;

    fn edit_content(
        &self,
        handle: NotificationHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>>;

    fn delete_content(&self, handle: NotificationHandle) -> BoxFuture<'static, SinkResult<()>>;
}
