//! Realtime notifications to connected clients.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    #[error("realtime delivery failed: {0}")]
    Delivery(String),
}

/// One notification on a channel. Clients subscribe to the channel named after their user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealtimeMessage {
    pub channel: String,
    pub event: String,
    pub data: String,
}

#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    async fn trigger(&self, channel: &str, event: &str, data: &str) -> Result<(), RealtimeError>;
}

#[async_trait]
impl<N> RealtimeNotifier for Arc<N>
where
    N: RealtimeNotifier + ?Sized,
{
    async fn trigger(&self, channel: &str, event: &str, data: &str) -> Result<(), RealtimeError> {
        (**self).trigger(channel, event, data).await
    }
}

/// In-process fan-out over a tokio broadcast channel.
///
/// Triggering with no subscribers is not an error; the message is simply dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl RealtimeNotifier for BroadcastNotifier {
    async fn trigger(&self, channel: &str, event: &str, data: &str) -> Result<(), RealtimeError> {
        let _ = self.tx.send(RealtimeMessage {
            channel: channel.to_string(),
            event: event.to_string(),
            data: data.to_string(),
        });
        Ok(())
    }
}
