//! Delayed, HTTP-shaped task execution.
//!
//! A [`PushQueue`] runs one task roughly `delay` after it was enqueued. Durability
//! and retry are properties of the backend: the cloud task queue is durable, the
//! in-memory timer is lost on restart, the emulator is for local development.
//! Callers must not assume more than "probably runs once, roughly on time".

pub mod cloud_tasks;
pub mod emulator;
pub mod in_memory;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::dispatcher::DispatchError;

pub use cloud_tasks::{CloudTask, CloudTasksClient, CloudTasksPushQueue};
pub use emulator::EmulatorPushQueue;
pub use in_memory::InMemoryPushQueue;

/// Header carrying the queue's API key on every delivered task.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PushQueueError {
    /// The backend did not accept the task in time.
    #[error("enqueue timed out: {0}")]
    Timeout(String),

    #[error("enqueue failed: {0}")]
    Enqueue(String),

    /// The in-memory queue has no consumer to hand tasks to.
    #[error("no task consumer bound to queue {0}")]
    Unbound(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// One HTTP invocation to perform later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushQueueTask {
    pub method: HttpMethod,
    pub url: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

/// Where the queue delivers tasks and who they are delivered as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushQueueConfig {
    pub name: String,
    pub user_api_key: String,
    pub user_id: String,
    pub consumer_endpoint: String,
}

impl Default for PushQueueConfig {
    fn default() -> Self {
        Self {
            name: "events-queue".to_string(),
            user_api_key: String::new(),
            user_id: String::new(),
            consumer_endpoint: "http://localhost:8080/v1/events".to_string(),
        }
    }
}

#[async_trait]
pub trait PushQueue: Send + Sync {
    /// Schedule `task` after `delay`; returns the backend's id for the queued task.
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError>;
}

#[async_trait]
impl<Q> PushQueue for Arc<Q>
where
    Q: PushQueue + ?Sized,
{
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError> {
        (**self).enqueue(task, delay).await
    }
}

/// Receives task bodies delivered by a queue.
#[async_trait]
pub trait TaskConsumer: Send + Sync {
    async fn consume(&self, body: &[u8]) -> Result<(), DispatchError>;
}
