use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::envelope::EventError;

/// Every event kind the pipeline produces or consumes.
///
/// The wire names are part of the persisted format (event store rows and ledger
/// signatures) and must not change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "message.api.sent")]
    MessageApiSent,
    #[serde(rename = "message.api.deleted")]
    MessageApiDeleted,
    #[serde(rename = "message.phone.sending")]
    MessagePhoneSending,
    #[serde(rename = "message.phone.sent")]
    MessagePhoneSent,
    #[serde(rename = "message.phone.delivered")]
    MessagePhoneDelivered,
    #[serde(rename = "message.phone.received")]
    MessagePhoneReceived,
    #[serde(rename = "message.send.failed")]
    MessageSendFailed,
    #[serde(rename = "message.send.expired")]
    MessageSendExpired,
    #[serde(rename = "message.send.retry")]
    MessageSendRetry,
    #[serde(rename = "message.notification.scheduled")]
    MessageNotificationScheduled,
    #[serde(rename = "message.notification.send")]
    MessageNotificationSend,
    #[serde(rename = "message.notification.sent")]
    MessageNotificationSent,
    #[serde(rename = "message.notification.failed")]
    MessageNotificationFailed,
    #[serde(rename = "message-thread.api.deleted")]
    MessageThreadApiDeleted,
    #[serde(rename = "user.account.deleted")]
    UserAccountDeleted,
    #[serde(rename = "webhook.send.failed")]
    WebhookSendFailed,
}

impl EventType {
    pub const ALL: [EventType; 16] = [
        Self::MessageApiSent,
        Self::MessageApiDeleted,
        Self::MessagePhoneSending,
        Self::MessagePhoneSent,
        Self::MessagePhoneDelivered,
        Self::MessagePhoneReceived,
        Self::MessageSendFailed,
        Self::MessageSendExpired,
        Self::MessageSendRetry,
        Self::MessageNotificationScheduled,
        Self::MessageNotificationSend,
        Self::MessageNotificationSent,
        Self::MessageNotificationFailed,
        Self::MessageThreadApiDeleted,
        Self::UserAccountDeleted,
        Self::WebhookSendFailed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MessageApiSent => "message.api.sent",
            Self::MessageApiDeleted => "message.api.deleted",
            Self::MessagePhoneSending => "message.phone.sending",
            Self::MessagePhoneSent => "message.phone.sent",
            Self::MessagePhoneDelivered => "message.phone.delivered",
            Self::MessagePhoneReceived => "message.phone.received",
            Self::MessageSendFailed => "message.send.failed",
            Self::MessageSendExpired => "message.send.expired",
            Self::MessageSendRetry => "message.send.retry",
            Self::MessageNotificationScheduled => "message.notification.scheduled",
            Self::MessageNotificationSend => "message.notification.send",
            Self::MessageNotificationSent => "message.notification.sent",
            Self::MessageNotificationFailed => "message.notification.failed",
            Self::MessageThreadApiDeleted => "message-thread.api.deleted",
            Self::UserAccountDeleted => "user.account.deleted",
            Self::WebhookSendFailed => "webhook.send.failed",
        }
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EventError::UnknownType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for t in EventType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            "message.api.sentt".parse::<EventType>(),
            Err(EventError::UnknownType(_))
        ));
        assert!(serde_json::from_str::<EventType>("\"phone.updated\"").is_err());
    }
}
