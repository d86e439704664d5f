use std::sync::{OnceLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};
use uuid::Uuid;

use super::{PushQueue, PushQueueError, PushQueueTask, TaskConsumer};

/// Best-effort, single-process queue backed by tokio timers.
///
/// Tasks are not persisted; anything still waiting when the process exits is lost.
/// The task's URL is ignored: the body goes straight to the bound consumer.
pub struct InMemoryPushQueue {
    name: String,
    consumer: OnceLock<Weak<dyn TaskConsumer>>,
}

impl InMemoryPushQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consumer: OnceLock::new(),
        }
    }

    /// Attach the consumer that receives task bodies. Only the first call takes effect.
    pub fn bind(&self, consumer: Weak<dyn TaskConsumer>) {
        let _ = self.consumer.set(consumer);
    }
}

#[async_trait]
impl PushQueue for InMemoryPushQueue {
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError> {
        let consumer = self
            .consumer
            .get()
            .cloned()
            .ok_or_else(|| PushQueueError::Unbound(self.name.clone()))?;

        let queue_id = Uuid::new_v4().to_string();
        let name = self.name.clone();
        let id = queue_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(consumer) = consumer.upgrade() else {
                error!(queue = %name, queue_id = %id, "consumer dropped before task fired");
                return;
            };
            if let Err(err) = consumer.consume(&task.body).await {
                error!(queue = %name, queue_id = %id, error = %err, "cannot consume queued task");
            }
        });

        info!(
            queue = %self.name,
            queue_id = %queue_id,
            delay_ms = delay.as_millis() as u64,
            "item added to in-memory queue"
        );
        Ok(queue_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchError;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorder {
        bodies: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl TaskConsumer for Recorder {
        async fn consume(&self, body: &[u8]) -> Result<(), DispatchError> {
            self.bodies.lock().unwrap().push(body.to_vec());
            Ok(())
        }
    }

    fn task(body: &str) -> PushQueueTask {
        PushQueueTask {
            method: crate::push_queue::HttpMethod::Post,
            url: "http://localhost/v1/events".into(),
            body: body.as_bytes().to_vec(),
            headers: BTreeMap::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_body_after_delay() {
        let recorder = Arc::new(Recorder::default());
        let queue = InMemoryPushQueue::new("test");
        let consumer: Arc<dyn TaskConsumer> = recorder.clone();
        queue.bind(Arc::downgrade(&consumer));

        queue.enqueue(task("payload"), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(recorder.bodies.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(recorder.bodies.lock().unwrap().as_slice(), &[b"payload".to_vec()]);
    }

    #[tokio::test]
    async fn unbound_queue_rejects_tasks() {
        let queue = InMemoryPushQueue::new("test");
        let err = queue.enqueue(task("x"), Duration::ZERO).await.unwrap_err();
        assert_eq!(err, PushQueueError::Unbound("test".into()));
    }
}
