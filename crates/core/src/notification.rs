//! Phone push notifications and the queue-depth throttle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{MessageId, NotificationId, PhoneId, UserId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneNotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl PhoneNotificationStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// A push notification telling a phone to fetch and send one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNotification {
    pub id: NotificationId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub status: PhoneNotificationStatus,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PhoneNotification {
    /// A pending notification due at `scheduled_at`. The throttle may push it later.
    pub fn pending(
        user_id: UserId,
        phone_id: PhoneId,
        message_id: MessageId,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            message_id,
            user_id,
            phone_id,
            status: PhoneNotificationStatus::Pending,
            scheduled_at,
            created_at: scheduled_at,
            updated_at: scheduled_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PhoneNotificationStatus::Pending
    }

    /// Move a pending notification to a terminal status.
    pub fn transition(&mut self, status: PhoneNotificationStatus) -> DomainResult<()> {
        if !self.is_pending() {
            return Err(DomainError::NotificationFinished {
                id: self.id.to_string(),
                status: self.status.as_str(),
            });
        }
        if status == PhoneNotificationStatus::Pending {
            return Err(DomainError::NotificationReopened(self.id.to_string()));
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Delay for a new notification given the notifications already pending on the phone.
///
/// Each minute slot holds `messages_per_minute` notifications, so the n-th pending
/// notification (0-based) lands in minute `n / messages_per_minute`. A zero throttle
/// means the phone is not rate limited.
pub fn throttle_delay(pending_count: usize, messages_per_minute: u32) -> Duration {
    if messages_per_minute == 0 {
        return Duration::zero();
    }
    let minutes = pending_count as u64 / u64::from(messages_per_minute);
    Duration::minutes(i64::try_from(minutes).unwrap_or(i64::MAX / 60_000))
}
