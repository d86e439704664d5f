//! Listeners: the subscribers the dispatcher fans events out to.
//!
//! Every listener except the realtime notifier runs its side effect through
//! [`crate::ledger::guarded`], so it acts at most once per event.

pub mod billing;
pub mod phone_notification;
pub mod realtime;
pub mod thread;
pub mod webhook;

pub use billing::BillingListener;
pub use phone_notification::PhoneNotificationListener;
pub use realtime::RealtimeListener;
pub use thread::MessageThreadListener;
pub use webhook::WebhookListener;
