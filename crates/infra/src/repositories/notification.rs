use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use smsgate_core::{
    MessageId, NotificationId, PhoneId, PhoneNotification, PhoneNotificationStatus, UserId,
    throttle_delay,
};

use super::RepositoryError;

/// Outcome of [`PhoneNotificationRepository::schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scheduled {
    /// Inserted with its throttled `scheduled_at`.
    New(PhoneNotification),
    /// The message already had a pending notification on this phone; nothing was inserted.
    Existing(PhoneNotification),
}

impl Scheduled {
    pub fn notification(&self) -> &PhoneNotification {
        match self {
            Self::New(n) | Self::Existing(n) => n,
        }
    }

    pub fn into_notification(self) -> PhoneNotification {
        match self {
            Self::New(n) | Self::Existing(n) => n,
        }
    }
}

#[async_trait]
pub trait PhoneNotificationRepository: Send + Sync {
    /// Throttle and insert a pending notification in one step.
    ///
    /// If the phone already holds a pending notification for the same message, that
    /// one is returned as [`Scheduled::Existing`]. Otherwise counts the phone's pending
    /// notifications, pushes `scheduled_at` back by the throttle delay for that count
    /// and inserts the row. Lookup, count and insert are atomic per phone.
    async fn schedule(
        &self,
        messages_per_minute: u32,
        notification: PhoneNotification,
    ) -> Result<Scheduled, RepositoryError>;

    async fn load(&self, notification_id: NotificationId) -> Result<PhoneNotification, RepositoryError>;

    /// Move a pending notification to a terminal status. `Conflict` if it is not pending.
    async fn update_status(
        &self,
        notification_id: NotificationId,
        status: PhoneNotificationStatus,
    ) -> Result<PhoneNotification, RepositoryError>;

    async fn count_pending(&self, phone_id: PhoneId) -> Result<usize, RepositoryError>;

    /// Drop pending notifications for a message; returns how many were removed.
    async fn delete_pending_for_message(
        &self,
        user_id: &UserId,
        message_id: MessageId,
    ) -> Result<usize, RepositoryError>;

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize, RepositoryError>;
}

/// In-memory repository. A single mutex makes `schedule` atomic across phones,
/// which is stricter than the per-phone guarantee the trait asks for.
#[derive(Debug, Default)]
pub struct InMemoryPhoneNotificationRepository {
    notifications: Mutex<HashMap<NotificationId, PhoneNotification>>,
}

impl InMemoryPhoneNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<PhoneNotification> {
        self.notifications
            .lock()
            .map(|n| n.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PhoneNotificationRepository for InMemoryPhoneNotificationRepository {
    async fn schedule(
        &self,
        messages_per_minute: u32,
        mut notification: PhoneNotification,
    ) -> Result<Scheduled, RepositoryError> {
        let mut notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;

        let mut pending = 0;
        for n in notifications.values() {
            if n.phone_id != notification.phone_id || !n.is_pending() {
                continue;
            }
            if n.message_id == notification.message_id {
                return Ok(Scheduled::Existing(n.clone()));
            }
            pending += 1;
        }

        notification.scheduled_at += throttle_delay(pending, messages_per_minute);
        notifications.insert(notification.id, notification.clone());
        Ok(Scheduled::New(notification))
    }

    async fn load(&self, notification_id: NotificationId) -> Result<PhoneNotification, RepositoryError> {
        let notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;
        notifications
            .get(&notification_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("notification {notification_id}")))
    }

    async fn update_status(
        &self,
        notification_id: NotificationId,
        status: PhoneNotificationStatus,
    ) -> Result<PhoneNotification, RepositoryError> {
        let mut notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;
        let notification = notifications
            .get_mut(&notification_id)
            .ok_or_else(|| RepositoryError::not_found(format!("notification {notification_id}")))?;
        notification
            .transition(status)
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        Ok(notification.clone())
    }

    async fn count_pending(&self, phone_id: PhoneId) -> Result<usize, RepositoryError> {
        let notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;
        Ok(notifications
            .values()
            .filter(|n| n.phone_id == phone_id && n.is_pending())
            .count())
    }

    async fn delete_pending_for_message(
        &self,
        user_id: &UserId,
        message_id: MessageId,
    ) -> Result<usize, RepositoryError> {
        let mut notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;
        let before = notifications.len();
        notifications.retain(|_, n| {
            !(&n.user_id == user_id && n.message_id == message_id && n.is_pending())
        });
        Ok(before - notifications.len())
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        let mut notifications = self
            .notifications
            .lock()
            .map_err(|_| RepositoryError::poisoned())?;
        let before = notifications.len();
        notifications.retain(|_, n| &n.user_id != user_id);
        Ok(before - notifications.len())
    }
}
