use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use smsgate_core::{MessageId, MessageStatus, MessageThread, ThreadUpdate, UserId};
use smsgate_events::{Event, EventType, Listener, ListenerError, MessagePhoneSent};
use smsgate_infra::Dispatcher;
use smsgate_infra::event_store::InMemoryEventStore;
use smsgate_infra::ledger::{EventListenerLedger, InMemoryEventListenerLedger, guarded};
use smsgate_infra::push_queue::{InMemoryPushQueue, PushQueueConfig};

const IDENTITIES: [&str; 8] = ["l0", "l1", "l2", "l3", "l4", "l5", "l6", "l7"];
const SUBSCRIPTIONS: &[EventType] = &[EventType::MessagePhoneSent];

/// Ledger-guarded listener with no side effect of its own.
struct NoopListener {
    identity: &'static str,
    ledger: Arc<dyn EventListenerLedger>,
}

#[async_trait]
impl Listener for NoopListener {
    fn identity(&self) -> &'static str {
        self.identity
    }

    fn subscriptions(&self) -> &'static [EventType] {
        SUBSCRIPTIONS
    }

    async fn handle(&self, event: &Event) -> Result<(), ListenerError> {
        guarded(self.ledger.as_ref(), event, self.identity, || async { Ok(()) }).await
    }
}

fn sent_event() -> Event {
    Event::new(
        "bench",
        &MessagePhoneSent {
            message_id: MessageId::new(),
            user_id: UserId::new("bench-user"),
            owner: "+100".into(),
            contact: "+200".into(),
            content: "hello".into(),
            timestamp: Utc::now(),
        },
    )
    .unwrap()
}

fn bench_dispatch_fan_out(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("dispatch_fan_out");
    group.throughput(Throughput::Elements(1));

    for listeners in [1usize, 4, 8] {
        let ledger: Arc<dyn EventListenerLedger> = Arc::new(InMemoryEventListenerLedger::new());
        let dispatcher = Dispatcher::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryPushQueue::new("bench")),
            PushQueueConfig::default(),
        );
        for identity in IDENTITIES.iter().copied().take(listeners) {
            dispatcher.register(Arc::new(NoopListener {
                identity,
                ledger: ledger.clone(),
            }));
        }

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &listeners, |b, _| {
            b.iter(|| {
                runtime
                    .block_on(dispatcher.dispatch(black_box(sent_event())))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_duplicate_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let ledger: Arc<dyn EventListenerLedger> = Arc::new(InMemoryEventListenerLedger::new());
    let dispatcher = Dispatcher::new(
        Arc::new(InMemoryEventStore::new()),
        Arc::new(InMemoryPushQueue::new("bench")),
        PushQueueConfig::default(),
    );
    for identity in IDENTITIES {
        dispatcher.register(Arc::new(NoopListener {
            identity,
            ledger: ledger.clone(),
        }));
    }
    let event = sent_event();
    runtime.block_on(dispatcher.dispatch(event.clone())).unwrap();

    c.bench_function("dispatch_already_handled", |b| {
        b.iter(|| runtime.block_on(dispatcher.dispatch(black_box(event.clone()))).unwrap());
    });
}

fn bench_thread_acceptance(c: &mut Criterion) {
    let message_id = MessageId::new();
    let now = Utc::now();
    let update = |status, offset| ThreadUpdate {
        user_id: UserId::new("bench-user"),
        owner: "+100".into(),
        contact: "+200".into(),
        message_id,
        content: "hello".into(),
        status,
        timestamp: now + chrono::Duration::seconds(offset),
    };
    let thread = MessageThread::from_update(&update(MessageStatus::Sent, 0), "blue");
    let late_echo = update(MessageStatus::Sending, 10);
    let delivered = update(MessageStatus::Delivered, 20);

    let mut group = c.benchmark_group("thread_acceptance");
    group.bench_function("reject_regression", |b| {
        b.iter(|| thread.evaluate(black_box(&late_echo)))
    });
    group.bench_function("accept_progress", |b| {
        b.iter(|| thread.evaluate(black_box(&delivered)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch_fan_out,
    bench_duplicate_dispatch,
    bench_thread_acceptance
);
criterion_main!(benches);
