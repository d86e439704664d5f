use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use smsgate_core::{MessageStatus, ThreadUpdate};
use smsgate_events::{
    Event, EventError, EventType, Listener, ListenerError, MessageApiDeleted, MessageApiSent,
    MessageNotificationScheduled, MessagePhoneDelivered, MessagePhoneReceived, MessagePhoneSending,
    MessagePhoneSent, MessageSendExpired, MessageSendFailed, MessageThreadApiDeleted,
    UserAccountDeleted,
};

use crate::ledger::{EventListenerLedger, guarded};
use crate::services::MessageThreadService;

const IDENTITY: &str = "MessageThreadListener";

const SUBSCRIPTIONS: &[EventType] = &[
    EventType::MessageApiSent,
    EventType::MessageNotificationScheduled,
    EventType::MessagePhoneSending,
    EventType::MessagePhoneSent,
    EventType::MessagePhoneDelivered,
    EventType::MessageSendFailed,
    EventType::MessageSendExpired,
    EventType::MessagePhoneReceived,
    EventType::MessageApiDeleted,
    EventType::MessageThreadApiDeleted,
    EventType::UserAccountDeleted,
];

pub struct MessageThreadListener {
    service: Arc<MessageThreadService>,
    ledger: Arc<dyn EventListenerLedger>,
}

impl MessageThreadListener {
    pub fn new(service: Arc<MessageThreadService>, ledger: Arc<dyn EventListenerLedger>) -> Self {
        Self { service, ledger }
    }

    async fn apply(&self, event: &Event) -> Result<(), ListenerError> {
        match event.event_type() {
            EventType::MessageApiDeleted => {
                let payload: MessageApiDeleted = event.decode()?;
                self.service.update_after_deletion(&payload).await?;
            }
            EventType::MessageThreadApiDeleted => {
                let payload: MessageThreadApiDeleted = event.decode()?;
                self.service
                    .delete_thread(&payload.user_id, payload.message_thread_id)
                    .await?;
            }
            EventType::UserAccountDeleted => {
                let payload: UserAccountDeleted = event.decode()?;
                self.service.purge_user(&payload.user_id).await?;
            }
            _ => match thread_update(event)? {
                Some(update) => {
                    self.service.update_thread(update).await?;
                }
                None => debug!(event_type = %event.event_type(), "event does not touch threads"),
            },
        }
        Ok(())
    }
}

/// Map a message lifecycle event onto the thread update it implies.
pub fn thread_update(event: &Event) -> Result<Option<ThreadUpdate>, EventError> {
    let update = match event.event_type() {
        EventType::MessageApiSent => {
            let p: MessageApiSent = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Pending,
                timestamp: p.request_received_at,
            }
        }
        EventType::MessageNotificationScheduled => {
            let p: MessageNotificationScheduled = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Scheduled,
                timestamp: event.time(),
            }
        }
        EventType::MessagePhoneSending => {
            let p: MessagePhoneSending = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Sending,
                timestamp: event.time(),
            }
        }
        EventType::MessagePhoneSent => {
            let p: MessagePhoneSent = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Sent,
                timestamp: p.timestamp,
            }
        }
        EventType::MessagePhoneDelivered => {
            let p: MessagePhoneDelivered = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Delivered,
                timestamp: p.timestamp,
            }
        }
        EventType::MessageSendFailed => {
            let p: MessageSendFailed = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Failed,
                timestamp: p.timestamp,
            }
        }
        EventType::MessageSendExpired => {
            let p: MessageSendExpired = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Expired,
                timestamp: p.timestamp,
            }
        }
        EventType::MessagePhoneReceived => {
            let p: MessagePhoneReceived = event.decode()?;
            ThreadUpdate {
                user_id: p.user_id,
                owner: p.owner,
                contact: p.contact,
                message_id: p.message_id,
                content: p.content,
                status: MessageStatus::Received,
                timestamp: p.timestamp,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(update))
}

#[async_trait]
impl Listener for MessageThreadListener {
    fn identity(&self) -> &'static str {
        IDENTITY
    }

    fn subscriptions(&self) -> &'static [EventType] {
        SUBSCRIPTIONS
    }

    async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        guarded(self.ledger.as_ref(), event, IDENTITY, || self.apply(event)).await
    }
}
