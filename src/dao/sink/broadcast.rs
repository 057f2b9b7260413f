use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    ChannelHandle, ChannelLookup, NotificationContent, NotificationHandle, NotificationSink,
    SinkError, SinkResult,
};
use crate::{
    dto::{
        format_system_time,
        sse::{ChannelCreatedEvent, NotificationDeletedEvent, NotificationEvent, ServerEvent},
    },
    state::SseHub,
};

const EVENT_CHANNEL_CREATED: &str = "channel.created";
const EVENT_NOTIFICATION_CREATED: &str = "notification.created";
const EVENT_NOTIFICATION_UPDATED: &str = "notification.updated";
const EVENT_NOTIFICATION_DELETED: &str = "notification.deleted";

/// In-process sink: keeps the current notifications in memory, logs every change and fans it
/// out on the notification SSE stream.
#[derive(Clone)]
pub struct BroadcastSink {
    channels: Arc<DashMap<String, ChannelHandle>>,
    messages: Arc<DashMap<NotificationHandle, NotificationContent>>,
    hub: SseHub,
}

impl BroadcastSink {
    pub fn new(hub: SseHub) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            messages: Arc::new(DashMap::new()),
            hub,
        }
    }

    /// Current content of a notification, if it still exists.
    pub fn content(&self, handle: &NotificationHandle) -> Option<NotificationContent> {
        self.messages.get(handle).map(|entry| entry.value().clone())
    }

    /// Number of live notifications across all channels.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn publish(&self, event: &str, payload: &impl Serialize) {
        match ServerEvent::json(Some(event.to_string()), payload) {
            Ok(event) => self.hub.broadcast(event),
            Err(err) => warn!(event, error = %err, "failed to serialize notification event"),
        }
    }
}

impl NotificationSink for BroadcastSink {
    fn ensure_channel(&self, title: String) -> BoxFuture<'static, SinkResult<ChannelLookup>> {
        let lookup = match self.channels.entry(title.clone()) {
            Entry::Occupied(entry) => ChannelLookup {
                handle: entry.get().clone(),
                existed: true,
            },
            Entry::Vacant(entry) => {
                let handle = ChannelHandle(Uuid::new_v4().simple().to_string());
                entry.insert(handle.clone());
                info!(channel = %handle, %title, "created notification channel");
                self.publish(
                    EVENT_CHANNEL_CREATED,
                    &ChannelCreatedEvent {
                        channel: handle.clone(),
                        title,
                        at: format_system_time(SystemTime::now()),
                    },
                );
                ChannelLookup {
                    handle,
                    existed: false,
                }
            }
        };
        Box::pin(async move { Ok(lookup) })
    }

    fn post_content(
        &self,
        channel: ChannelHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>> {
        let known = self.channels.iter().any(|entry| *entry.value() == channel);
        if !known {
            return Box::pin(async move {
                Err(SinkError::HandleGone {
                    handle: channel.to_string(),
                })
            });
        }

        let handle = NotificationHandle {
            channel,
            message_id: Uuid::new_v4().simple().to_string(),
        };
        info!(%handle, title = %content.title, "posted notification");
        self.messages.insert(handle.clone(), content.clone());
        self.publish(
            EVENT_NOTIFICATION_CREATED,
            &NotificationEvent {
                handle: handle.clone(),
                content,
                at: format_system_time(SystemTime::now()),
            },
        );
        Box::pin(async move { Ok(handle) })
    }

    fn edit_content(
        &self,
        handle: NotificationHandle,
        content: NotificationContent,
    ) -> BoxFuture<'static, SinkResult<NotificationHandle>> {
        let result = match self.messages.get_mut(&handle) {
            Some(mut entry) => {
                *entry.value_mut() = content.clone();
                drop(entry);
                info!(%handle, title = %content.title, "edited notification");
                self.publish(
                    EVENT_NOTIFICATION_UPDATED,
                    &NotificationEvent {
                        handle: handle.clone(),
                        content,
                        at: format_system_time(SystemTime::now()),
                    },
                );
                Ok(handle)
            }
            None => Err(SinkError::HandleGone {
                handle: handle.to_string(),
            }),
        };
        Box::pin(async move { result })
    }

    fn delete_content(&self, handle: NotificationHandle) -> BoxFuture<'static, SinkResult<()>> {
        let result = match self.messages.remove(&handle) {
            Some(_) => {
                info!(%handle, "deleted notification");
                self.publish(
                    EVENT_NOTIFICATION_DELETED,
                    &NotificationDeletedEvent {
                        handle,
                        at: format_system_time(SystemTime::now()),
                    },
                );
                Ok(())
            }
            None => Err(SinkError::HandleGone {
                handle: handle.to_string(),
            }),
        };
        Box::pin(async move { result })
    }
}
