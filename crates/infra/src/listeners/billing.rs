use std::sync::Arc;

use async_trait::async_trait;

use smsgate_events::{Event, EventType, Listener, ListenerError, MessageApiSent, MessagePhoneReceived};

use crate::ledger::{EventListenerLedger, guarded};
use crate::services::BillingService;

const IDENTITY: &str = "BillingListener";

const SUBSCRIPTIONS: &[EventType] = &[EventType::MessageApiSent, EventType::MessagePhoneReceived];

pub struct BillingListener {
    service: Arc<BillingService>,
    ledger: Arc<dyn EventListenerLedger>,
}

impl BillingListener {
    pub fn new(service: Arc<BillingService>, ledger: Arc<dyn EventListenerLedger>) -> Self {
        Self { service, ledger }
    }

    async fn apply(&self, event: &Event) -> Result<(), ListenerError> {
        match event.event_type() {
            EventType::MessageApiSent => {
                let p: MessageApiSent = event.decode()?;
                self.service
                    .register_sent_message(&p.user_id, p.request_received_at)
                    .await?;
            }
            EventType::MessagePhoneReceived => {
                let p: MessagePhoneReceived = event.decode()?;
                self.service.register_received_message(&p.user_id, p.timestamp).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[async_trait]
impl Listener for BillingListener {
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
