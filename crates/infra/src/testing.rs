//! Shared fakes for unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use smsgate_events::{Event, EventType, Listener, ListenerError};

use crate::dispatcher::Dispatcher;
use crate::event_store::InMemoryEventStore;
use crate::ledger::{EventListenerLedger, guarded};
use crate::push_queue::{PushQueue, PushQueueConfig, PushQueueError, PushQueueTask};

/// Queue that records tasks and never runs them.
#[derive(Default)]
pub struct RecordingPushQueue {
    tasks: Mutex<Vec<(PushQueueTask, Duration)>>,
}

impl RecordingPushQueue {
    pub fn tasks(&self) -> Vec<(PushQueueTask, Duration)> {
        self.tasks.lock().unwrap().clone()
    }

    /// Queued events with their delays, in enqueue order.
    pub fn events(&self) -> Vec<(Event, Duration)> {
        self.tasks()
            .into_iter()
            .map(|(task, delay)| (Event::from_json(&task.body).unwrap(), delay))
            .collect()
    }
}

#[async_trait]
impl PushQueue for RecordingPushQueue {
    async fn enqueue(&self, task: PushQueueTask, delay: Duration) -> Result<String, PushQueueError> {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push((task, delay));
        Ok(format!("task-{}", tasks.len()))
    }
}

pub fn queue_config() -> PushQueueConfig {
    PushQueueConfig {
        name: "test-queue".into(),
        user_api_key: "queue-key".into(),
        user_id: "queue-user".into(),
        consumer_endpoint: "http://localhost:8080/v1/events".into(),
    }
}

pub fn recording_dispatcher() -> (Arc<Dispatcher>, Arc<InMemoryEventStore>, Arc<RecordingPushQueue>) {
    let store = Arc::new(InMemoryEventStore::new());
    let queue = Arc::new(RecordingPushQueue::default());
    let dispatcher = Dispatcher::new(store.clone(), queue.clone(), queue_config());
    (dispatcher, store, queue)
}

pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Listener that counts invocations, optionally through the ledger.
pub struct CountingListener {
    pub identity: &'static str,
    pub subscriptions: &'static [EventType],
    pub behavior: Behavior,
    pub ledger: Option<Arc<dyn EventListenerLedger>>,
    pub calls: AtomicUsize,
}

impl CountingListener {
    pub fn new(identity: &'static str, subscriptions: &'static [EventType], behavior: Behavior) -> Self {
        Self {
            identity,
            subscriptions,
            behavior,
            ledger: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn EventListenerLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn act(&self) -> Result<(), ListenerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(ListenerError::handler("always fails")),
            Behavior::Panic => panic!("listener panicked on purpose"),
        }
    }
}

#[async_trait]
impl Listener for CountingListener {
    fn identity(&self) -> &'static str {
        self.identity
    }

    fn subscriptions(&self) -> &'static [EventType] {
        self.subscriptions
    }

    async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        match &self.ledger {
            Some(ledger) => guarded(ledger.as_ref(), event, self.identity, || self.act()).await,
            None => self.act().await,
        }
    }
}
