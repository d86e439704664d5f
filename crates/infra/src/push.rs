//! Mobile push provider seam.
//!
//! The real sender (a vendor SDK) is an external collaborator. [`InMemoryPushProvider`]
//! records messages instead of delivering them and backs tests and local runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

/// Data key the Android app reads the message id from.
pub const KEY_MESSAGE_ID: &str = "KEY_MESSAGE_ID";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushError {
    #[error("push provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PushPriority {
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub data: BTreeMap<String, String>,
    pub ttl: Duration,
    pub priority: PushPriority,
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Send one message; returns the provider's message id.
    async fn send(&self, message: PushMessage) -> Result<String, PushError>;
}

#[async_trait]
impl<P> PushProvider for Arc<P>
where
    P: PushProvider + ?Sized,
{
    async fn send(&self, message: PushMessage) -> Result<String, PushError> {
        (**self).send(message).await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryPushProvider {
    sent: Mutex<Vec<PushMessage>>,
    failure: Option<String>,
}

impl InMemoryPushProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that rejects every message with `error`.
    pub fn failing(error: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(error.into()),
        }
    }

    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PushProvider for InMemoryPushProvider {
    async fn send(&self, message: PushMessage) -> Result<String, PushError> {
        if let Some(error) = &self.failure {
            return Err(PushError::Provider(error.clone()));
        }
        self.sent
            .lock()
            .map_err(|_| PushError::Provider("lock poisoned".to_string()))?
            .push(message);
        Ok(format!("projects/smsgate/messages/{}", Uuid::new_v4()))
    }
}
