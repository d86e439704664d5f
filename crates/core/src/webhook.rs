//! User webhook subscriptions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{UserId, WebhookId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,
    pub user_id: UserId,
    pub url: String,
    /// HMAC key for the bearer token; blank disables signing.
    pub signing_key: String,
    /// Event type names the webhook subscribes to.
    pub events: Vec<String>,
    /// Owner numbers the webhook listens on; empty means every number.
    pub phone_numbers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn new(user_id: UserId, url: impl Into<String>, events: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: WebhookId::new(),
            user_id,
            url: url.into(),
            signing_key: String::new(),
            events,
            phone_numbers: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_signing_key(mut self, key: impl Into<String>) -> Self {
        self.signing_key = key.into();
        self
    }

    pub fn with_phone_numbers(mut self, numbers: Vec<String>) -> Self {
        self.phone_numbers = numbers;
        self
    }

    pub fn matches(&self, event_type: &str, phone_number: &str) -> bool {
        self.events.iter().any(|e| e == event_type)
            && (self.phone_numbers.is_empty() || self.phone_numbers.iter().any(|p| p == phone_number))
    }

    pub fn is_signed(&self) -> bool {
        !self.signing_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_on_event_type_and_number() {
        let hook = Webhook::new(
            UserId::new("u"),
            "https://example.com/hook",
            vec!["message.phone.received".to_string()],
        )
        .with_phone_numbers(vec!["+100".to_string()]);

        assert!(hook.matches("message.phone.received", "+100"));
        assert!(!hook.matches("message.phone.received", "+200"));
        assert!(!hook.matches("message.phone.sent", "+100"));
    }
}
