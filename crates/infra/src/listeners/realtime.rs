use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use smsgate_events::{
    Event, EventType, Listener, ListenerError, MessagePhoneDelivered, MessagePhoneSent,
    MessageSendFailed,
};

use crate::realtime::RealtimeNotifier;

const IDENTITY: &str = "RealtimeListener";

const SUBSCRIPTIONS: &[EventType] = &[
    EventType::MessagePhoneSent,
    EventType::MessageSendFailed,
    EventType::MessagePhoneDelivered,
];

/// Tells connected clients that one of their messages changed. Re-notifying is
/// harmless, so this listener does not consult the ledger.
pub struct RealtimeListener {
    notifier: Arc<dyn RealtimeNotifier>,
}

impl RealtimeListener {
    pub fn new(notifier: Arc<dyn RealtimeNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Listener for RealtimeListener {
    fn identity(&self) -> &'static str {
        IDENTITY
    }

    fn subscriptions(&self) -> &'static [EventType] {
        SUBSCRIPTIONS
    }

    async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        let user_id = match event.event_type() {
            EventType::MessagePhoneSent => event.decode::<MessagePhoneSent>()?.user_id,
            EventType::MessageSendFailed => event.decode::<MessageSendFailed>()?.user_id,
            EventType::MessagePhoneDelivered => event.decode::<MessagePhoneDelivered>()?.user_id,
            _ => return Ok(()),
        };

        self.notifier
            .trigger(user_id.as_str(), event.event_type().as_str(), event.id())
            .await
            .map_err(|err| ListenerError::handler(err.to_string()))?;

        info!(
            user_id = %user_id,
            event_id = %event.id(),
            event_type = %event.event_type(),
            "realtime notification sent"
        );
        Ok(())
    }
}
