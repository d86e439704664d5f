//! Typed payloads, each bound to exactly one [`EventType`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use smsgate_core::{MessageId, MessageStatus, NotificationId, PhoneId, ThreadId, UserId, WebhookId};

use crate::event_type::EventType;

/// A payload type and the event type it is carried under.
pub trait EventPayload: Serialize + DeserializeOwned {
    const EVENT_TYPE: EventType;
}

macro_rules! event_payload {
    ($t:ty, $event_type:expr) => {
        impl EventPayload for $t {
            const EVENT_TYPE: EventType = $event_type;
        }
    };
}

/// A user asked the API to send a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageApiSent {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    #[serde(default)]
    pub encrypted: bool,
    pub request_received_at: DateTime<Utc>,
}

/// A user deleted a message. `previous_*` describe the message before it in the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageApiDeleted {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub previous_message_id: Option<MessageId>,
    #[serde(default)]
    pub previous_message_status: Option<MessageStatus>,
    #[serde(default)]
    pub previous_message_content: Option<String>,
}

/// The phone picked the message up and is handing it to the SMS stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneSending {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneSent {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneDelivered {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// An inbound SMS arrived on the phone. `owner` is the phone's number, `contact` the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePhoneReceived {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSendFailed {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSendExpired {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub send_attempt_count: u32,
    pub timestamp: DateTime<Utc>,
}

/// An expired message is being sent again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSendRetry {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotificationScheduled {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub notification_id: NotificationId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub scheduled_at: DateTime<Utc>,
}

/// Fires when a scheduled notification is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotificationSend {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub notification_id: NotificationId,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotificationSent {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub notification_id: NotificationId,
    pub scheduled_at: DateTime<Utc>,
    /// Push time-to-live in seconds.
    pub message_expiration_duration: i64,
    pub fcm_message_id: String,
    pub notification_sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNotificationFailed {
    pub message_id: MessageId,
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub notification_id: NotificationId,
    pub error_message: String,
    pub notification_failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageThreadApiDeleted {
    pub message_thread_id: ThreadId,
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccountDeleted {
    pub user_id: UserId,
    pub user_email: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSendFailed {
    pub webhook_id: WebhookId,
    pub webhook_url: String,
    pub owner: String,
    pub user_id: UserId,
    pub event_id: String,
    pub event_type: EventType,
    pub event_payload: String,
    pub http_response_status_code: Option<u16>,
    pub error_message: String,
}

event_payload!(MessageApiSent, EventType::MessageApiSent);
event_payload!(MessageApiDeleted, EventType::MessageApiDeleted);
event_payload!(MessagePhoneSending, EventType::MessagePhoneSending);
event_payload!(MessagePhoneSent, EventType::MessagePhoneSent);
event_payload!(MessagePhoneDelivered, EventType::MessagePhoneDelivered);
event_payload!(MessagePhoneReceived, EventType::MessagePhoneReceived);
event_payload!(MessageSendFailed, EventType::MessageSendFailed);
event_payload!(MessageSendExpired, EventType::MessageSendExpired);
event_payload!(MessageSendRetry, EventType::MessageSendRetry);
event_payload!(MessageNotificationScheduled, EventType::MessageNotificationScheduled);
event_payload!(MessageNotificationSend, EventType::MessageNotificationSend);
event_payload!(MessageNotificationSent, EventType::MessageNotificationSent);
event_payload!(MessageNotificationFailed, EventType::MessageNotificationFailed);
event_payload!(MessageThreadApiDeleted, EventType::MessageThreadApiDeleted);
event_payload!(UserAccountDeleted, EventType::UserAccountDeleted);
event_payload!(WebhookSendFailed, EventType::WebhookSendFailed);
