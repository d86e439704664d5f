//! Registered gateway phone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{PhoneId, UserId};

/// Message expiration window used when a phone has none configured.
pub const DEFAULT_MESSAGE_EXPIRATION_SECONDS: u32 = 600;

/// Send attempts used when a phone has none configured.
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 2;

/// An Android phone acting as an SMS gateway for one owner number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: PhoneId,
    pub user_id: UserId,
    /// The phone number this device sends from.
    pub phone_number: String,
    /// Push token; `None` until the app registers with the push provider.
    pub fcm_token: Option<String>,
    /// Throttle for outbound notifications; `0` disables throttling.
    pub messages_per_minute: u32,
    pub message_expiration_seconds: u32,
    pub max_send_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Phone {
    pub fn new(user_id: UserId, phone_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PhoneId::new(),
            user_id,
            phone_number: phone_number.into(),
            fcm_token: None,
            messages_per_minute: 0,
            message_expiration_seconds: 0,
            max_send_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_fcm_token(mut self, token: impl Into<String>) -> Self {
        self.fcm_token = Some(token.into());
        self
    }

    pub fn with_messages_per_minute(mut self, mpm: u32) -> Self {
        self.messages_per_minute = mpm;
        self
    }

    pub fn with_message_expiration_seconds(mut self, seconds: u32) -> Self {
        self.message_expiration_seconds = seconds;
        self
    }

    /// Replace unset numeric settings with their defaults.
    pub fn sanitize(mut self) -> Self {
        if self.message_expiration_seconds == 0 {
            self.message_expiration_seconds = DEFAULT_MESSAGE_EXPIRATION_SECONDS;
        }
        if self.max_send_attempts == 0 {
            self.max_send_attempts = DEFAULT_MAX_SEND_ATTEMPTS;
        }
        self
    }

    /// Window after which an undelivered message expires (also the push TTL).
    pub fn message_expiration_duration(&self) -> Duration {
        let seconds = match self.message_expiration_seconds {
            0 => DEFAULT_MESSAGE_EXPIRATION_SECONDS,
            s => s,
        };
        Duration::seconds(i64::from(seconds))
    }

    /// Registered push token, ignoring blank values.
    pub fn push_token(&self) -> Option<&str> {
        self.fcm_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_fills_unset_settings() {
        let phone = Phone::new(UserId::new("u"), "+100").sanitize();
        assert_eq!(phone.message_expiration_seconds, 600);
        assert_eq!(phone.max_send_attempts, 2);
    }

    #[test]
    fn expiration_defaults_without_sanitize() {
        let phone = Phone::new(UserId::new("u"), "+100");
        assert_eq!(phone.message_expiration_duration(), Duration::minutes(10));

        let phone = phone.with_message_expiration_seconds(30);
        assert_eq!(phone.message_expiration_duration(), Duration::seconds(30));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let phone = Phone::new(UserId::new("u"), "+100").with_fcm_token("   ");
        assert_eq!(phone.push_token(), None);
    }
}
