use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use smsgate_events::Event;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    /// The backing storage failed or is unreachable.
    #[error("storage error: {0}")]
    Storage(String),

    /// A stored row could not be turned back into an event.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Event store abstraction (async, storage-agnostic).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persist an event. Idempotent by event id.
    async fn save(&self, event: &Event) -> Result<(), EventStoreError>;

    /// Every stored event in insertion order. Used by replay tooling, not the hot path.
    async fn fetch_all(&self) -> Result<Vec<Event>, EventStoreError>;
}

#[async_trait]
impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    async fn save(&self, event: &Event) -> Result<(), EventStoreError> {
        (**self).save(event).await
    }

    async fn fetch_all(&self) -> Result<Vec<Event>, EventStoreError> {
        (**self).fetch_all().await
    }
}
