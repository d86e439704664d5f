//! Domain services driven by the listeners.

pub mod billing;
pub mod phone_notification;
pub mod thread;
pub mod webhook;

use thiserror::Error;

use smsgate_core::DomainError;
use smsgate_events::{EventError, ListenerError};

use crate::dispatcher::DispatchError;
use crate::repositories::RepositoryError;

pub use billing::BillingService;
pub use phone_notification::{
    PhoneNotificationScheduleParams, PhoneNotificationSendParams, PhoneNotificationService,
};
pub use thread::MessageThreadService;
pub use webhook::WebhookService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<ServiceError> for ListenerError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Event(err) => ListenerError::Decode(err),
            other => ListenerError::Handler(other.to_string()),
        }
    }
}
