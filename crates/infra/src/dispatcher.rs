//! Event dispatcher: store, then fan out.
//!
//! ## Pipeline
//!
//! 1. **Validate** the envelope
//! 2. **Store** it (a store failure fails the whole call; nothing is fanned out)
//! 3. **Fan out** to every listener registered for the event type, concurrently,
//!    and wait for all of them
//!
//! Listener failures and panics are logged and never reach the caller. There is no
//! redelivery: a listener that failed only gets another chance if the producer
//! dispatches the event again.
//!
//! ## Deferred dispatch
//!
//! [`Dispatcher::dispatch_with_timeout`] does not store anything up front. It hands
//! the serialized event to the push queue, and the queue's consumer (see
//! [`TaskConsumer`]) calls `dispatch` when the delay has elapsed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use smsgate_events::{Event, EventError, EventType, Listener};

use crate::event_store::{EventStore, EventStoreError};
use crate::push_queue::{
    API_KEY_HEADER, HttpMethod, PushQueue, PushQueueConfig, PushQueueError, PushQueueTask,
    TaskConsumer,
};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    #[error("push queue error: {0}")]
    Queue(#[from] PushQueueError),

    #[error("invalid event: {0}")]
    Event(#[from] EventError),
}

/// What services use to emit events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError>;

    /// Dispatch after `delay`; returns the id of the queued task.
    async fn dispatch_with_timeout(&self, event: Event, delay: Duration) -> Result<String, DispatchError>;
}

pub struct Dispatcher {
    store: Arc<dyn EventStore>,
    queue: Arc<dyn PushQueue>,
    queue_config: PushQueueConfig,
    listeners: RwLock<HashMap<EventType, Vec<Arc<dyn Listener>>>>,
    this: Weak<Dispatcher>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn EventStore>,
        queue: Arc<dyn PushQueue>,
        queue_config: PushQueueConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            queue,
            queue_config,
            listeners: RwLock::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Register `listener` for `event_type`.
    ///
    /// Returns `false` if a listener with the same identity is already registered
    /// for that type; the registry is left unchanged in that case.
    pub fn subscribe(&self, event_type: EventType, listener: Arc<dyn Listener>) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let registered = listeners.entry(event_type).or_default();

        if registered
            .iter()
            .any(|l| l.identity() == listener.identity())
        {
            debug!(
                event_type = %event_type,
                listener = listener.identity(),
                "listener already subscribed"
            );
            return false;
        }

        info!(
            event_type = %event_type,
            listener = listener.identity(),
            "listener subscribed"
        );
        registered.push(listener);
        true
    }

    /// Subscribe a listener to every type it declares.
    pub fn register(&self, listener: Arc<dyn Listener>) {
        for event_type in listener.subscriptions() {
            self.subscribe(*event_type, Arc::clone(&listener));
        }
    }

    pub fn listener_count(&self, event_type: EventType) -> usize {
        self.listeners_for(event_type).len()
    }

    fn listeners_for(&self, event_type: EventType) -> Vec<Arc<dyn Listener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Store the event, then run every listener for its type concurrently and
    /// wait for all of them.
    pub async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        event.validate()?;
        self.store.save(&event).await?;

        let listeners = self.listeners_for(event.event_type());
        if listeners.is_empty() {
            debug!(
                event_id = %event.id(),
                event_type = %event.event_type(),
                "no listeners for event"
            );
            return Ok(());
        }

        let event = Arc::new(event);
        let mut tasks = JoinSet::new();
        for listener in listeners {
            let event = Arc::clone(&event);
            tasks.spawn(async move {
                let started = Instant::now();
                let result = listener.handle(&event).await;
                (listener.identity(), started.elapsed(), result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((identity, elapsed, Ok(()))) => debug!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    listener = identity,
                    duration_ms = elapsed.as_millis() as u64,
                    "listener handled event"
                ),
                Ok((identity, _, Err(err))) => error!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    listener = identity,
                    error = %err,
                    "listener failed to handle event"
                ),
                Err(err) if err.is_panic() => error!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    error = %err,
                    "listener panicked"
                ),
                Err(err) => warn!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    error = %err,
                    "listener task cancelled"
                ),
            }
        }

        Ok(())
    }

    /// Hand the event to the push queue for delivery after `delay`.
    ///
    /// When the queue times out the event is kept on a local timer instead and the
    /// returned id is `local-<eventID>`.
    pub async fn dispatch_with_timeout(
        &self,
        event: Event,
        delay: Duration,
    ) -> Result<String, DispatchError> {
        let task = self.build_task(&event)?;

        match self.queue.enqueue(task, delay).await {
            Ok(queue_id) => {
                info!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    queue = %self.queue_config.name,
                    queue_id = %queue_id,
                    delay_ms = delay.as_millis() as u64,
                    "event scheduled on push queue"
                );
                Ok(queue_id)
            }
            Err(PushQueueError::Timeout(msg)) => {
                warn!(
                    event_id = %event.id(),
                    event_type = %event.event_type(),
                    queue = %self.queue_config.name,
                    error = %msg,
                    "push queue timed out, falling back to local timer"
                );
                let queue_id = format!("local-{}", event.id());
                self.dispatch_locally(event, delay);
                Ok(queue_id)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn build_task(&self, event: &Event) -> Result<PushQueueTask, DispatchError> {
        let headers = BTreeMap::from([
            (
                API_KEY_HEADER.to_string(),
                self.queue_config.user_api_key.clone(),
            ),
            ("content-type".to_string(), "application/json".to_string()),
        ]);

        Ok(PushQueueTask {
            method: HttpMethod::Post,
            url: self.queue_config.consumer_endpoint.clone(),
            body: event.to_json()?,
            headers,
        })
    }

    fn dispatch_locally(&self, event: Event, delay: Duration) {
        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(dispatcher) = this.upgrade() else {
                warn!(event_id = %event.id(), "dispatcher dropped before local timer fired");
                return;
            };
            let event_id = event.id().to_string();
            if let Err(err) = dispatcher.dispatch(event).await {
                error!(event_id = %event_id, error = %err, "cannot dispatch locally deferred event");
            }
        });
    }
}

#[async_trait]
impl EventPublisher for Dispatcher {
    async fn dispatch(&self, event: Event) -> Result<(), DispatchError> {
        Dispatcher::dispatch(self, event).await
    }

    async fn dispatch_with_timeout(&self, event: Event, delay: Duration) -> Result<String, DispatchError> {
        Dispatcher::dispatch_with_timeout(self, event, delay).await
    }
}

#[async_trait]
impl TaskConsumer for Dispatcher {
    async fn consume(&self, body: &[u8]) -> Result<(), DispatchError> {
        let event = Event::from_json(body)?;
        self.dispatch(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use crate::ledger::{EventListenerLedger, InMemoryEventListenerLedger};
    use crate::testing::{Behavior, CountingListener, RecordingPushQueue, queue_config, recording_dispatcher};
    use chrono::Utc;
    use smsgate_events::{ListenerError, handler_signature};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Barrier;

    const SENT: &[EventType] = &[EventType::MessagePhoneSent];

    fn event(id: &str) -> Event {
        Event::from_parts(id, EventType::MessagePhoneSent, "test", Utc::now(), serde_json::json!({}))
    }

    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn save(&self, _event: &Event) -> Result<(), EventStoreError> {
            Err(EventStoreError::Storage("database down".into()))
        }

        async fn fetch_all(&self) -> Result<Vec<Event>, EventStoreError> {
            Ok(vec![])
        }
    }

    struct TimeoutQueue;

    #[async_trait]
    impl PushQueue for TimeoutQueue {
        async fn enqueue(&self, _task: PushQueueTask, _delay: Duration) -> Result<String, PushQueueError> {
            Err(PushQueueError::Timeout("deadline exceeded".into()))
        }
    }

    /// Asserts the event is already in the store when it is handled.
    struct StoreProbe {
        store: Arc<InMemoryEventStore>,
        saw_event: AtomicBool,
    }

    #[async_trait]
    impl Listener for StoreProbe {
        fn identity(&self) -> &'static str {
            "StoreProbe"
        }

        fn subscriptions(&self) -> &'static [EventType] {
            SENT
        }

        async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
            let stored = self.store.fetch_all().await.unwrap();
            self.saw_event
                .store(stored.iter().any(|e| e.id() == event.id()), Ordering::SeqCst);
            Ok(())
        }
    }

    struct BarrierListener {
        identity: &'static str,
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Listener for BarrierListener {
        fn identity(&self) -> &'static str {
            self.identity
        }

        fn subscriptions(&self) -> &'static [EventType] {
            SENT
        }

        async fn handle(&self, _event: &Event) -> Result<(), ListenerError> {
            self.barrier.wait().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn event_is_stored_before_listeners_run() {
        let (dispatcher, store, _) = recording_dispatcher();
        let probe = Arc::new(StoreProbe {
            store: store.clone(),
            saw_event: AtomicBool::new(false),
        });
        dispatcher.register(probe.clone());

        dispatcher.dispatch(event("e-1")).await.unwrap();

        assert!(probe.saw_event.load(Ordering::SeqCst));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn store_failure_fails_dispatch_without_fan_out() {
        let dispatcher = Dispatcher::new(
            Arc::new(FailingStore),
            Arc::new(RecordingPushQueue::default()),
            queue_config(),
        );
        let listener = Arc::new(CountingListener::new("Counter", SENT, Behavior::Succeed));
        dispatcher.register(listener.clone());

        let err = dispatcher.dispatch(event("e-1")).await.unwrap_err();

        assert!(matches!(err, DispatchError::Store(_)));
        assert_eq!(listener.calls(), 0);
    }

    #[tokio::test]
    async fn failing_listener_does_not_block_healthy_sibling() {
        let (dispatcher, _, _) = recording_dispatcher();
        let ledger = Arc::new(InMemoryEventListenerLedger::new());
        let broken = Arc::new(CountingListener::new("Broken", SENT, Behavior::Fail));
        let healthy = Arc::new(
            CountingListener::new("Healthy", SENT, Behavior::Succeed).with_ledger(ledger.clone()),
        );
        dispatcher.register(broken.clone());
        dispatcher.register(healthy.clone());

        dispatcher.dispatch(event("e-1")).await.unwrap();

        assert_eq!(broken.calls(), 1);
        assert_eq!(healthy.calls(), 1);
        let signature = handler_signature(EventType::MessagePhoneSent, "Healthy");
        assert!(ledger.has("e-1", &signature).await.unwrap());
    }

    #[tokio::test]
    async fn panicking_listener_is_contained() {
        let (dispatcher, _, _) = recording_dispatcher();
        let panicking = Arc::new(CountingListener::new("Panics", SENT, Behavior::Panic));
        let healthy = Arc::new(CountingListener::new("Healthy", SENT, Behavior::Succeed));
        dispatcher.register(panicking);
        dispatcher.register(healthy.clone());

        dispatcher.dispatch(event("e-1")).await.unwrap();

        assert_eq!(healthy.calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_subscription_is_ignored() {
        let (dispatcher, _, _) = recording_dispatcher();
        let listener = Arc::new(CountingListener::new("Counter", SENT, Behavior::Succeed));

        assert!(dispatcher.subscribe(EventType::MessagePhoneSent, listener.clone()));
        assert!(!dispatcher.subscribe(EventType::MessagePhoneSent, listener.clone()));
        dispatcher.register(listener.clone());
        assert_eq!(dispatcher.listener_count(EventType::MessagePhoneSent), 1);

        dispatcher.dispatch(event("e-1")).await.unwrap();
        assert_eq!(listener.calls(), 1);
    }

    #[tokio::test]
    async fn listeners_run_concurrently() {
        let (dispatcher, _, _) = recording_dispatcher();
        let barrier = Arc::new(Barrier::new(2));
        for identity in ["First", "Second"] {
            dispatcher.register(Arc::new(BarrierListener {
                identity,
                barrier: barrier.clone(),
            }));
        }

        tokio::time::timeout(Duration::from_secs(5), dispatcher.dispatch(event("e-1")))
            .await
            .expect("listeners should not wait on each other")
            .unwrap();
    }

    #[tokio::test]
    async fn only_listeners_for_the_type_are_called() {
        let (dispatcher, _, _) = recording_dispatcher();
        let other = Arc::new(CountingListener::new(
            "Other",
            &[EventType::MessageApiSent],
            Behavior::Succeed,
        ));
        dispatcher.register(other.clone());

        dispatcher.dispatch(event("e-1")).await.unwrap();
        assert_eq!(other.calls(), 0);
    }

    #[tokio::test]
    async fn deferred_dispatch_enqueues_the_serialized_event() {
        let (dispatcher, store, queue) = recording_dispatcher();
        let event = event("e-1");

        let queue_id = dispatcher
            .dispatch_with_timeout(event.clone(), Duration::from_secs(90))
            .await
            .unwrap();

        assert_eq!(queue_id, "task-1");
        assert!(store.is_empty());
        let tasks = queue.tasks();
        let (task, delay) = &tasks[0];
        assert_eq!(*delay, Duration::from_secs(90));
        assert_eq!(task.method, HttpMethod::Post);
        assert_eq!(task.url, "http://localhost:8080/v1/events");
        assert_eq!(task.headers[API_KEY_HEADER], "queue-key");
        assert_eq!(Event::from_json(&task.body).unwrap(), event);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_timeout_falls_back_to_local_timer() {
        let store = Arc::new(InMemoryEventStore::new());
        let dispatcher = Dispatcher::new(store.clone(), Arc::new(TimeoutQueue), queue_config());
        let listener = Arc::new(CountingListener::new("Counter", SENT, Behavior::Succeed));
        dispatcher.register(listener.clone());

        let queue_id = dispatcher
            .dispatch_with_timeout(event("e-1"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(queue_id, "local-e-1");
        assert_eq!(listener.calls(), 0);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(listener.calls(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn consumer_decodes_and_dispatches() {
        let (dispatcher, store, _) = recording_dispatcher();
        let body = event("e-1").to_json().unwrap();

        dispatcher.consume(&body).await.unwrap();
        assert_eq!(store.len(), 1);

        let err = dispatcher.consume(b"not json").await.unwrap_err();
        assert!(matches!(err, DispatchError::Event(_)));
    }
}
