//! Cloud-events style envelope carried through the dispatcher, the store and the push queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::event_type::EventType;
use crate::payload::EventPayload;

/// Envelope format version.
pub const SPEC_VERSION: &str = "1.0";

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown event type: {0}")]
    UnknownType(String),

    #[error("event type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: EventType,
        actual: EventType,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid event: {0}")]
    Invalid(String),
}

/// An immutable fact with an id, a type, a causal source, a time and a JSON payload.
///
/// Fields are private so an event cannot be altered once built; the dispatcher and
/// the stores only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: String,
    #[serde(rename = "type")]
    event_type: EventType,
    source: String,
    specversion: String,
    time: DateTime<Utc>,
    datacontenttype: String,
    data: serde_json::Value,
}

impl Event {
    /// Build an event for `payload`; the type comes from the payload.
    pub fn new<P: EventPayload>(source: impl Into<String>, payload: &P) -> Result<Self, EventError> {
        let data = serde_json::to_value(payload)
            .map_err(|e| EventError::Serialization(e.to_string()))?;
        Ok(Self::from_parts(
            Uuid::now_v7().to_string(),
            P::EVENT_TYPE,
            source,
            Utc::now(),
            data,
        ))
    }

    /// Rebuild an event from stored columns.
    pub fn from_parts(
        id: impl Into<String>,
        event_type: EventType,
        source: impl Into<String>,
        time: DateTime<Utc>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            source: source.into(),
            specversion: SPEC_VERSION.to_string(),
            time,
            datacontenttype: JSON_CONTENT_TYPE.to_string(),
            data,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    /// Decode the payload, checking that it belongs to this event's type.
    pub fn decode<P: EventPayload>(&self) -> Result<P, EventError> {
        if self.event_type != P::EVENT_TYPE {
            return Err(EventError::TypeMismatch {
                expected: P::EVENT_TYPE,
                actual: self.event_type,
            });
        }
        serde_json::from_value(self.data.clone())
            .map_err(|e| EventError::Serialization(format!("{}: {e}", self.event_type)))
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if self.id.trim().is_empty() {
            return Err(EventError::Invalid("id is empty".into()));
        }
        if self.source.trim().is_empty() {
            return Err(EventError::Invalid("source is empty".into()));
        }
        if self.specversion != SPEC_VERSION {
            return Err(EventError::Invalid(format!(
                "unsupported specversion {}",
                self.specversion
            )));
        }
        if !self.data.is_object() {
            return Err(EventError::Invalid("data must be a JSON object".into()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::Serialization(e.to_string()))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(bytes).map_err(|e| EventError::Serialization(e.to_string()))
    }
}
