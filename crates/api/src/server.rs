//! Builds the pipeline and the router from configuration.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sqlx::PgPool;
use tracing::info;

use smsgate_infra::event_store::PostgresEventStore;
use smsgate_infra::ledger::PostgresEventListenerLedger;
use smsgate_infra::push_queue::{EmulatorPushQueue, InMemoryPushQueue, PushQueue, TaskConsumer};
use smsgate_infra::realtime::BroadcastNotifier;
use smsgate_infra::repositories::PostgresPhoneNotificationRepository;
use smsgate_infra::{Pipeline, PipelineConfig, PipelineParts, PushQueueBackend};

use crate::app::{AppState, build_app};

pub struct Server {
    pub app: Router,
    pub pipeline: Pipeline,
}

/// In-memory parts, with the event store, the ledger and the notification
/// repository on Postgres when `DATABASE_URL` is set.
pub async fn parts_from_config(config: &PipelineConfig) -> anyhow::Result<PipelineParts> {
    let mut parts = PipelineParts::in_memory();

    if let Some(database_url) = &config.database_url {
        let pool = PgPool::connect(database_url)
            .await
            .context("cannot connect to Postgres")?;
        smsgate_infra::schema::migrate(&pool)
            .await
            .context("cannot apply pipeline schema")?;

        parts.event_store = Arc::new(PostgresEventStore::new(pool.clone()));
        parts.ledger = Arc::new(PostgresEventListenerLedger::new(pool.clone()));
        parts.notifications = Arc::new(PostgresPhoneNotificationRepository::new(pool));
        info!("using Postgres stores");
    }

    Ok(parts)
}

/// Wire the pipeline around `parts` and the configured push queue backend.
///
/// `parts.realtime` is replaced by a broadcast notifier shared with the SSE route,
/// and signed webhooks carry `EVENT_SOURCE` as their issuer.
pub fn build(config: &PipelineConfig, mut parts: PipelineParts) -> anyhow::Result<Server> {
    let realtime = BroadcastNotifier::default();
    parts.realtime = Arc::new(realtime.clone());
    parts.webhook_issuer = config.event_source.clone();

    let pipeline = match config.push_queue_backend {
        PushQueueBackend::InMemory => {
            let queue = Arc::new(InMemoryPushQueue::new(config.push_queue_name.clone()));
            let pipeline = Pipeline::build(parts, queue.clone(), config.queue_config());
            let consumer: Arc<dyn TaskConsumer> = pipeline.dispatcher.clone();
            queue.bind(Arc::downgrade(&consumer));
            pipeline
        }
        PushQueueBackend::Emulator => {
            let queue: Arc<dyn PushQueue> = Arc::new(
                EmulatorPushQueue::new(config.push_queue_name.clone())
                    .context("cannot build emulator push queue")?,
            );
            Pipeline::build(parts, queue, config.queue_config())
        }
    };

    info!(
        backend = ?config.push_queue_backend,
        queue = %config.push_queue_name,
        "push queue configured"
    );

    let app = build_app(
        AppState {
            dispatcher: pipeline.dispatcher.clone(),
            realtime,
        },
        config.events_queue_user_api_key.as_str(),
    );
    Ok(Server { app, pipeline })
}
