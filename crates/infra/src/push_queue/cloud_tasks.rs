//! Durable backend: a managed cloud task queue.
//!
//! The vendor SDK sits behind [`CloudTasksClient`]; this module owns request
//! shaping (schedule time, merged headers, method mapping) and the bounded retry
//! around task creation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::{HttpMethod, PushQueue, PushQueueError, PushQueueTask};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// A task creation request as the cloud queue expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudTask {
    /// Fully qualified queue path the task is created under.
    pub parent: String,
    pub http_method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub schedule_time: DateTime<Utc>,
}

/// Narrow client for the cloud task service.
#[async_trait]
pub trait CloudTasksClient: Send + Sync {
    /// Create the task and return its server-assigned name.
    async fn create_task(&self, task: CloudTask) -> Result<String, PushQueueError>;
}

#[async_trait]
impl<C> CloudTasksClient for Arc<C>
where
    C: CloudTasksClient + ?Sized,
{
    async fn create_task(&self, task: CloudTask) -> Result<String, PushQueueError> {
        (**self).create_task(task).await
    }
}

pub struct CloudTasksPushQueue<C> {
    client: C,
    queue_path: String,
    attempts: u32,
    attempt_timeout: Duration,
}

impl<C: CloudTasksClient> CloudTasksPushQueue<C> {
    pub fn new(client: C, queue_path: impl Into<String>) -> Self {
        Self {
            client,
            queue_path: queue_path.into(),
            attempts: DEFAULT_ATTEMPTS,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    fn build_task(&self, task: PushQueueTask, delay: Duration) -> CloudTask {
        let mut headers = BTreeMap::from([(
            "content-type".to_string(),
            "application/json".to_string(),
        )]);
        headers.extend(task.headers);

        let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        CloudTask {
            parent: self.queue_path.clone(),
            http_method: task.method,
            url: task.url,
            headers,
            body: task.body,
            schedule_time: Utc::now() + delay,
        }
    }
}

#[async_trait]
impl<C: CloudTasksClient> PushQueue for CloudTasksPushQueue<C> {
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError> {
        let cloud_task = self.build_task(task, delay);
        let mut last_error = PushQueueError::Enqueue("no attempts made".to_string());

        for attempt in 1..=self.attempts {
            let result =
                tokio::time::timeout(self.attempt_timeout, self.client.create_task(cloud_task.clone()))
                    .await;

            match result {
                Ok(Ok(name)) => {
                    info!(
                        queue = %self.queue_path,
                        queue_id = %name,
                        schedule_time = %cloud_task.schedule_time,
                        attempt,
                        "item added to cloud task queue"
                    );
                    return Ok(name);
                }
                Ok(Err(err)) => {
                    warn!(queue = %self.queue_path, attempt, error = %err, "cannot create cloud task");
                    last_error = err;
                }
                Err(_) => {
                    warn!(queue = %self.queue_path, attempt, "cloud task creation timed out");
                    last_error = PushQueueError::Timeout(format!(
                        "no response from {} within {:?}",
                        self.queue_path, self.attempt_timeout
                    ));
                }
            }
        }

        Err(last_error)
    }
}
