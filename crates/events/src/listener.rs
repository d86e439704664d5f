//! The subscriber seam of the dispatcher.
//!
//! A listener declares the event types it reacts to up front, so the set of
//! subscriptions is known when the dispatcher is wired rather than discovered from
//! string keys at runtime.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::envelope::{Event, EventError};
use crate::event_type::EventType;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("cannot decode event: {0}")]
    Decode(#[from] EventError),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("handler error: {0}")]
    Handler(String),
}

impl ListenerError {
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }
}

/// An independent subscriber to pipeline events.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Stable name used in ledger signatures and logs.
    fn identity(&self) -> &'static str;

    /// Event types this listener is registered for.
    fn subscriptions(&self) -> &'static [EventType];

    async fn handle(&self, event: &Event) -> Result<(), ListenerError>;
}

#[async_trait]
impl<L> Listener for Arc<L>
where
    L: Listener + ?Sized,
{
    fn identity(&self) -> &'static str {
        (**self).identity()
    }

    fn subscriptions(&self) -> &'static [EventType] {
        (**self).subscriptions()
    }

    async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        (**self).handle(event).await
    }
}

/// Ledger key for one listener's handling of one event type: `"<eventType>.<identity>"`.
pub fn handler_signature(event_type: EventType, identity: &str) -> String {
    format!("{}.{}", event_type.as_str(), identity)
}
