//! Wires stores, services and listeners around one dispatcher.

use std::sync::Arc;

use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::ledger::{EventListenerLedger, InMemoryEventListenerLedger};
use crate::listeners::{
    BillingListener, MessageThreadListener, PhoneNotificationListener, RealtimeListener,
    WebhookListener,
};
use crate::push::{InMemoryPushProvider, PushProvider};
use crate::push_queue::{PushQueue, PushQueueConfig};
use crate::realtime::{BroadcastNotifier, RealtimeNotifier};
use crate::repositories::{
    BillingUsageRepository, InMemoryBillingUsageRepository, InMemoryMessageThreadRepository,
    InMemoryPhoneNotificationRepository, InMemoryPhoneRepository, InMemoryWebhookRepository,
    MessageThreadRepository, PhoneNotificationRepository, PhoneRepository, WebhookRepository,
};
use crate::services::webhook::DEFAULT_ISSUER;
use crate::services::{BillingService, MessageThreadService, PhoneNotificationService, WebhookService};

/// Everything the pipeline persists to or talks to. Fields are public so callers
/// can swap individual parts (for example the Postgres stores).
#[derive(Clone)]
pub struct PipelineParts {
    pub event_store: Arc<dyn EventStore>,
    pub ledger: Arc<dyn EventListenerLedger>,
    pub phones: Arc<dyn PhoneRepository>,
    pub notifications: Arc<dyn PhoneNotificationRepository>,
    pub threads: Arc<dyn MessageThreadRepository>,
    pub billing: Arc<dyn BillingUsageRepository>,
    pub webhooks: Arc<dyn WebhookRepository>,
    pub push: Arc<dyn PushProvider>,
    pub realtime: Arc<dyn RealtimeNotifier>,
    /// `iss` claim of signed webhook requests.
    pub webhook_issuer: String,
}

impl PipelineParts {
    pub fn in_memory() -> Self {
        Self {
            event_store: Arc::new(InMemoryEventStore::new()),
            ledger: Arc::new(InMemoryEventListenerLedger::new()),
            phones: Arc::new(InMemoryPhoneRepository::new()),
            notifications: Arc::new(InMemoryPhoneNotificationRepository::new()),
            threads: Arc::new(InMemoryMessageThreadRepository::new()),
            billing: Arc::new(InMemoryBillingUsageRepository::new()),
            webhooks: Arc::new(InMemoryWebhookRepository::new()),
            push: Arc::new(InMemoryPushProvider::new()),
            realtime: Arc::new(BroadcastNotifier::default()),
            webhook_issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

pub struct Pipeline {
    pub dispatcher: Arc<Dispatcher>,
    pub threads: Arc<MessageThreadService>,
    pub notifications: Arc<PhoneNotificationService>,
    pub billing: Arc<BillingService>,
    pub webhooks: Arc<WebhookService>,
}

impl Pipeline {
    /// Build the services and register every listener on a fresh dispatcher.
    pub fn build(parts: PipelineParts, queue: Arc<dyn PushQueue>, queue_config: PushQueueConfig) -> Self {
        let dispatcher = Dispatcher::new(parts.event_store.clone(), queue, queue_config);

        let threads = Arc::new(MessageThreadService::new(parts.threads.clone()));
        let notifications = Arc::new(PhoneNotificationService::new(
            parts.phones.clone(),
            parts.notifications.clone(),
            parts.push.clone(),
            dispatcher.clone(),
        ));
        let billing = Arc::new(BillingService::new(parts.billing.clone()));
        let webhooks = Arc::new(
            WebhookService::new(parts.webhooks.clone(), dispatcher.clone()).with_issuer(parts.webhook_issuer),
        );

        dispatcher.register(Arc::new(MessageThreadListener::new(threads.clone(), parts.ledger.clone())));
        dispatcher.register(Arc::new(PhoneNotificationListener::new(
            notifications.clone(),
            parts.ledger.clone(),
        )));
        dispatcher.register(Arc::new(BillingListener::new(billing.clone(), parts.ledger.clone())));
        dispatcher.register(Arc::new(WebhookListener::new(webhooks.clone(), parts.ledger.clone())));
        dispatcher.register(Arc::new(RealtimeListener::new(parts.realtime.clone())));

        info!("event pipeline wired");
        Self {
            dispatcher,
            threads,
            notifications,
            billing,
            webhooks,
        }
    }
}
