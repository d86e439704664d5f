use std::sync::Arc;

use async_trait::async_trait;

use smsgate_core::UserId;
use smsgate_events::{
    Event, EventError, EventType, Listener, ListenerError, MessagePhoneDelivered,
    MessagePhoneReceived, MessagePhoneSent, MessageSendExpired, MessageSendFailed,
};

use crate::ledger::{EventListenerLedger, guarded};
use crate::services::WebhookService;

const IDENTITY: &str = "WebhookListener";

const SUBSCRIPTIONS: &[EventType] = &[
    EventType::MessagePhoneReceived,
    EventType::MessagePhoneSent,
    EventType::MessagePhoneDelivered,
    EventType::MessageSendFailed,
    EventType::MessageSendExpired,
];

pub struct WebhookListener {
    service: Arc<WebhookService>,
    ledger: Arc<dyn EventListenerLedger>,
}

impl WebhookListener {
    pub fn new(service: Arc<WebhookService>, ledger: Arc<dyn EventListenerLedger>) -> Self {
        Self { service, ledger }
    }

    async fn apply(&self, event: &Event) -> Result<(), ListenerError> {
        let Some((user_id, owner)) = routing(event)? else {
            return Ok(());
        };
        self.service.send(&user_id, event, &owner).await?;
        Ok(())
    }
}

/// The user and phone number an event is delivered for.
fn routing(event: &Event) -> Result<Option<(UserId, String)>, EventError> {
    Ok(Some(match event.event_type() {
        EventType::MessagePhoneReceived => {
            let p: MessagePhoneReceived = event.decode()?;
            (p.user_id, p.owner)
        }
        EventType::MessagePhoneSent => {
            let p: MessagePhoneSent = event.decode()?;
            (p.user_id, p.owner)
        }
        EventType::MessagePhoneDelivered => {
            let p: MessagePhoneDelivered = event.decode()?;
            (p.user_id, p.owner)
        }
        EventType::MessageSendFailed => {
            let p: MessageSendFailed = event.decode()?;
            (p.user_id, p.owner)
        }
        EventType::MessageSendExpired => {
            let p: MessageSendExpired = event.decode()?;
            (p.user_id, p.owner)
        }
        _ => return Ok(None),
    }))
}

#[async_trait]
impl Listener for WebhookListener {
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
