//! Domain building blocks of the delivery pipeline.
//!
//! This crate contains **pure domain** types and rules (no infrastructure concerns).

pub mod billing;
pub mod error;
pub mod id;
pub mod message;
pub mod notification;
pub mod phone;
pub mod thread;
pub mod webhook;

pub use billing::BillingUsage;
pub use error::{DomainError, DomainResult};
pub use id::{MessageId, NotificationId, PhoneId, ThreadId, UserId, WebhookId};
pub use message::MessageStatus;
pub use notification::{PhoneNotification, PhoneNotificationStatus, throttle_delay};
pub use phone::Phone;
pub use thread::{MessageThread, ThreadUpdate, UpdateDecision};
pub use webhook::Webhook;
