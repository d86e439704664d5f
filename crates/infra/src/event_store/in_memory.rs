use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use smsgate_events::{Event, EventType};

use super::r#trait::{EventStore, EventStoreError};

#[derive(Debug, Default)]
struct Inner {
    ids: HashSet<String>,
    events: Vec<Event>,
}

/// In-memory append-only event store.
///
/// Intended for tests/dev and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored events of one type, oldest first.
    pub fn events_of_type(&self, event_type: EventType) -> Vec<Event> {
        self.inner
            .read()
            .map(|i| {
                i.events
                    .iter()
                    .filter(|e| e.event_type() == event_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save(&self, event: &Event) -> Result<(), EventStoreError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;

        if inner.ids.insert(event.id().to_string()) {
            inner.events.push(event.clone());
        }
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<Event>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Storage("lock poisoned".to_string()))?;
        Ok(inner.events.clone())
    }
}
