//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures raised by the pure domain rules. Storage and transport errors live
/// in the infrastructure crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A wire status string matched no known message or notification status.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// A notification left `pending` already and cannot move again.
    #[error("notification {id} is already {status}")]
    NotificationFinished { id: String, status: &'static str },

    /// Terminal statuses only; `pending` is the starting point.
    #[error("notification {0} cannot return to pending")]
    NotificationReopened(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
