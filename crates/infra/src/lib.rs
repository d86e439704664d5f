//! Infrastructure of the delivery pipeline: the dispatcher, its stores and queues,
//! the repositories, the services and the listeners that connect them.

pub mod config;
pub mod dispatcher;
pub mod event_store;
pub mod ledger;
pub mod listeners;
pub mod pipeline;
pub mod push;
pub mod push_queue;
pub mod realtime;
pub mod repositories;
pub mod schema;
pub mod services;

pub use config::{ConfigError, PipelineConfig, PushQueueBackend};
pub use dispatcher::{DispatchError, Dispatcher, EventPublisher};
pub use pipeline::{Pipeline, PipelineParts};

#[cfg(test)]
mod testing;
