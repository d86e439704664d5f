use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use smsgate_events::{
    Event, EventType, Listener, ListenerError, MessageApiDeleted, MessageApiSent,
    MessageNotificationSend, MessageSendRetry, UserAccountDeleted,
};

use crate::ledger::{EventListenerLedger, guarded};
use crate::services::{
    PhoneNotificationScheduleParams, PhoneNotificationSendParams, PhoneNotificationService,
};

const IDENTITY: &str = "PhoneNotificationListener";

const SUBSCRIPTIONS: &[EventType] = &[
    EventType::MessageApiSent,
    EventType::MessageSendRetry,
    EventType::MessageNotificationSend,
    EventType::MessageApiDeleted,
    EventType::UserAccountDeleted,
];

pub struct PhoneNotificationListener {
    service: Arc<PhoneNotificationService>,
    ledger: Arc<dyn EventListenerLedger>,
}

impl PhoneNotificationListener {
    pub fn new(service: Arc<PhoneNotificationService>, ledger: Arc<dyn EventListenerLedger>) -> Self {
        Self { service, ledger }
    }

    async fn apply(&self, event: &Event) -> Result<(), ListenerError> {
        match event.event_type() {
            EventType::MessageApiSent => {
                let p: MessageApiSent = event.decode()?;
                self.service
                    .schedule(PhoneNotificationScheduleParams {
                        user_id: p.user_id,
                        owner: p.owner,
                        contact: p.contact,
                        content: p.content,
                        message_id: p.message_id,
                        source: event.source().to_string(),
                    })
                    .await?;
            }
            EventType::MessageSendRetry => {
                let p: MessageSendRetry = event.decode()?;
                self.service
                    .schedule(PhoneNotificationScheduleParams {
                        user_id: p.user_id,
                        owner: p.owner,
                        contact: p.contact,
                        content: p.content,
                        message_id: p.message_id,
                        source: event.source().to_string(),
                    })
                    .await?;
            }
            EventType::MessageNotificationSend => {
                let p: MessageNotificationSend = event.decode()?;
                self.service
                    .send(PhoneNotificationSendParams::from_payload(p, event.source()))
                    .await?;
            }
            EventType::MessageApiDeleted => {
                let p: MessageApiDeleted = event.decode()?;
                self.service.cancel_for_message(&p.user_id, p.message_id).await?;
            }
            EventType::UserAccountDeleted => {
                let p: UserAccountDeleted = event.decode()?;
                self.service.purge_user(&p.user_id).await?;
            }
            other => debug!(event_type = %other, "event does not touch notifications"),
        }
        Ok(())
    }
}

#[async_trait]
impl Listener for PhoneNotificationListener {
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
