//! Event listener ledger: which listener already handled which event.
//!
//! Listeners whose side effects are not naturally idempotent wrap their work in
//! [`guarded`], which checks the ledger, runs the work and records the entry.
//! Check and record are separate calls; two concurrent deliveries of the same
//! event can both pass the check. The producing stream does not redeliver
//! concurrently, so this is accepted.

pub mod in_memory;
pub mod postgres;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use smsgate_events::{Event, EventType, ListenerError, handler_signature};

pub use in_memory::InMemoryEventListenerLedger;
pub use postgres::PostgresEventListenerLedger;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<LedgerError> for ListenerError {
    fn from(value: LedgerError) -> Self {
        ListenerError::Ledger(value.to_string())
    }
}

/// One row of the ledger. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventListenerLog {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: EventType,
    /// `"<eventType>.<listenerIdentity>"`
    pub handler: String,
    pub duration: Duration,
    pub handled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl EventListenerLog {
    pub fn new(event: &Event, handler: impl Into<String>, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            event_id: event.id().to_string(),
            event_type: event.event_type(),
            handler: handler.into(),
            duration,
            handled_at: now,
            created_at: now,
        }
    }
}

#[async_trait]
pub trait EventListenerLedger: Send + Sync {
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool, LedgerError>;

    /// Record a handled event. Recording an existing key is not an error.
    async fn store(&self, entry: EventListenerLog) -> Result<(), LedgerError>;
}

#[async_trait]
impl<L> EventListenerLedger for Arc<L>
where
    L: EventListenerLedger + ?Sized,
{
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool, LedgerError> {
        (**self).has(event_id, handler).await
    }

    async fn store(&self, entry: EventListenerLog) -> Result<(), LedgerError> {
        (**self).store(entry).await
    }
}

/// Run `act` at most once per (event, listener): check, act, then record.
///
/// A ledger hit short-circuits with `Ok(())`. If `act` fails nothing is recorded,
/// so a later redelivery gets another chance.
pub async fn guarded<F, Fut>(
    ledger: &dyn EventListenerLedger,
    event: &Event,
    identity: &str,
    act: F,
) -> Result<(), ListenerError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), ListenerError>>,
{
    let signature = handler_signature(event.event_type(), identity);
    if ledger.has(event.id(), &signature).await? {
        debug!(
            event_id = %event.id(),
            handler = %signature,
            "event already handled, skipping"
        );
        return Ok(());
    }

    let started = Instant::now();
    act().await?;

    ledger
        .store(EventListenerLog::new(event, signature, started.elapsed()))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> Event {
        Event::from_parts(
            "event-1",
            EventType::MessageApiSent,
            "test",
            Utc::now(),
            serde_json::json!({}),
        )
    }

    #[tokio::test]
    async fn guarded_work_runs_once_per_event() {
        let ledger = InMemoryEventListenerLedger::new();
        let calls = AtomicUsize::new(0);
        let event = event();

        for _ in 0..3 {
            guarded(&ledger, &event, "Counter", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.count("event-1", "message.api.sent.Counter"), 1);
    }

    #[tokio::test]
    async fn failed_work_is_not_recorded() {
        let ledger = InMemoryEventListenerLedger::new();
        let event = event();

        let result = guarded(&ledger, &event, "Broken", || async {
            Err(ListenerError::handler("boom"))
        })
        .await;

        assert!(result.is_err());
        assert!(!ledger.has("event-1", "message.api.sent.Broken").await.unwrap());
    }

    #[tokio::test]
    async fn identities_are_tracked_separately() {
        let ledger = InMemoryEventListenerLedger::new();
        let event = event();

        guarded(&ledger, &event, "A", || async { Ok(()) }).await.unwrap();
        guarded(&ledger, &event, "B", || async { Ok(()) }).await.unwrap();

        assert_eq!(ledger.len(), 2);
    }
}
