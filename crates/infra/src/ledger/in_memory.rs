use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{EventListenerLedger, EventListenerLog, LedgerError};

/// In-memory ledger keyed by `(event_id, handler)`.
#[derive(Debug, Default)]
pub struct InMemoryEventListenerLedger {
    entries: RwLock<HashMap<(String, String), EventListenerLog>>,
}

impl InMemoryEventListenerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows for one key; the unique key keeps this at 0 or 1.
    pub fn count(&self, event_id: &str, handler: &str) -> usize {
        self.entries
            .read()
            .map(|e| usize::from(e.contains_key(&(event_id.to_string(), handler.to_string()))))
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventListenerLedger for InMemoryEventListenerLedger {
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool, LedgerError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        Ok(entries.contains_key(&(event_id.to_string(), handler.to_string())))
    }

    async fn store(&self, entry: EventListenerLog) -> Result<(), LedgerError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        entries
            .entry((entry.event_id.clone(), entry.handler.clone()))
            .or_insert(entry);
        Ok(())
    }
}
