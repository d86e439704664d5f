//! Persistence seams for the records the listeners own.
//!
//! Every listener writes only its own records through one of these traits. In-memory
//! implementations back tests and single-process runs; the notification repository
//! also has a Postgres implementation because its schedule operation must be atomic
//! per phone.

pub mod billing;
pub mod notification;
pub mod phone;
pub mod postgres_notification;
pub mod thread;
pub mod webhook;

use thiserror::Error;

pub use billing::{BillingUsageRepository, InMemoryBillingUsageRepository};
pub use notification::{InMemoryPhoneNotificationRepository, PhoneNotificationRepository, Scheduled};
pub use phone::{InMemoryPhoneRepository, PhoneRepository};
pub use postgres_notification::PostgresPhoneNotificationRepository;
pub use thread::{InMemoryMessageThreadRepository, MessageThreadRepository};
pub use webhook::{InMemoryWebhookRepository, WebhookRepository};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A record with the same key exists, or the record changed underneath the caller.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn poisoned() -> Self {
        Self::Storage("lock poisoned".to_string())
    }
}
