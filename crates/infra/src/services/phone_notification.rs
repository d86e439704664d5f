//! Push notification scheduling and delivery.
//!
//! Scheduling reserves a throttled slot for the phone and defers a
//! `message.notification.send` event to that slot. When the deferred event fires,
//! [`PhoneNotificationService::send`] pushes to the device and records the outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use smsgate_core::{
    MessageId, NotificationId, Phone, PhoneId, PhoneNotification, PhoneNotificationStatus, UserId,
};
use smsgate_events::{
    Event, MessageNotificationFailed, MessageNotificationScheduled, MessageNotificationSend,
    MessageNotificationSent,
};

use super::ServiceError;
use crate::dispatcher::EventPublisher;
use crate::push::{KEY_MESSAGE_ID, PushMessage, PushPriority, PushProvider};
use crate::repositories::{PhoneNotificationRepository, PhoneRepository, RepositoryError, Scheduled};

#[derive(Debug, Clone)]
pub struct PhoneNotificationScheduleParams {
    pub user_id: UserId,
    pub owner: String,
    pub contact: String,
    pub content: String,
    pub message_id: MessageId,
    /// Source recorded on the events emitted while scheduling.
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct PhoneNotificationSendParams {
    pub user_id: UserId,
    pub phone_id: PhoneId,
    pub message_id: MessageId,
    pub notification_id: NotificationId,
    pub scheduled_at: DateTime<Utc>,
    pub source: String,
}

impl PhoneNotificationSendParams {
    pub fn from_payload(payload: MessageNotificationSend, source: impl Into<String>) -> Self {
        Self {
            user_id: payload.user_id,
            phone_id: payload.phone_id,
            message_id: payload.message_id,
            notification_id: payload.notification_id,
            scheduled_at: payload.scheduled_at,
            source: source.into(),
        }
    }
}

pub struct PhoneNotificationService {
    phones: Arc<dyn PhoneRepository>,
    notifications: Arc<dyn PhoneNotificationRepository>,
    push: Arc<dyn PushProvider>,
    publisher: Arc<dyn EventPublisher>,
}

impl PhoneNotificationService {
    pub fn new(
        phones: Arc<dyn PhoneRepository>,
        notifications: Arc<dyn PhoneNotificationRepository>,
        push: Arc<dyn PushProvider>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            phones,
            notifications,
            push,
            publisher,
        }
    }

    /// Reserve a throttled slot for the message and defer the push to it.
    ///
    /// Returns the stored notification, or the already pending one if the message
    /// was scheduled before.
    pub async fn schedule(
        &self,
        params: PhoneNotificationScheduleParams,
    ) -> Result<PhoneNotification, ServiceError> {
        let phone = self.phones.load(&params.user_id, &params.owner).await?.sanitize();

        let scheduled = self
            .notifications
            .schedule(
                phone.messages_per_minute,
                PhoneNotification::pending(
                    params.user_id.clone(),
                    phone.id,
                    params.message_id,
                    Utc::now(),
                ),
            )
            .await?;
        let notification = match scheduled {
            Scheduled::New(notification) => notification,
            Scheduled::Existing(existing) => {
                info!(
                    notification_id = %existing.id,
                    message_id = %params.message_id,
                    phone_id = %phone.id,
                    "notification already pending for message"
                );
                return Ok(existing);
            }
        };

        info!(
            notification_id = %notification.id,
            message_id = %notification.message_id,
            phone_id = %phone.id,
            scheduled_at = %notification.scheduled_at,
            messages_per_minute = phone.messages_per_minute,
            "notification scheduled"
        );

        let scheduled = Event::new(
            params.source.clone(),
            &MessageNotificationScheduled {
                message_id: notification.message_id,
                user_id: notification.user_id.clone(),
                phone_id: phone.id,
                notification_id: notification.id,
                owner: params.owner.clone(),
                contact: params.contact.clone(),
                content: params.content.clone(),
                scheduled_at: notification.scheduled_at,
            },
        )?;
        if let Err(err) = self.publisher.dispatch(scheduled).await {
            error!(
                notification_id = %notification.id,
                error = %err,
                "cannot dispatch notification scheduled event"
            );
        }

        let send = Event::new(
            params.source,
            &MessageNotificationSend {
                message_id: notification.message_id,
                user_id: notification.user_id.clone(),
                phone_id: phone.id,
                notification_id: notification.id,
                scheduled_at: notification.scheduled_at,
            },
        )?;
        let delay = (notification.scheduled_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let queue_id = match self.publisher.dispatch_with_timeout(send, delay).await {
            Ok(queue_id) => queue_id,
            Err(err) => {
                // Nothing will fire for this row; a pending row would hold a throttle slot forever.
                error!(
                    notification_id = %notification.id,
                    error = %err,
                    "cannot defer notification send"
                );
                self.finish(notification.id, PhoneNotificationStatus::Failed).await?;
                return Err(err.into());
            }
        };

        info!(
            notification_id = %notification.id,
            queue_id = %queue_id,
            delay_ms = delay.as_millis() as u64,
            "notification send deferred"
        );
        Ok(notification)
    }

    /// Push a due notification to the phone.
    ///
    /// Missing or no longer pending notifications (cancelled, or already handled)
    /// are skipped. A phone that cannot be loaded and delivery failures are recorded
    /// on the notification and reported through `message.notification.failed`; they
    /// are not errors of this call.
    pub async fn send(&self, params: PhoneNotificationSendParams) -> Result<(), ServiceError> {
        let notification = match self.notifications.load(params.notification_id).await {
            Ok(n) => n,
            Err(RepositoryError::NotFound(_)) => {
                info!(
                    notification_id = %params.notification_id,
                    message_id = %params.message_id,
                    "notification no longer exists, skipping send"
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if !notification.is_pending() {
            info!(
                notification_id = %notification.id,
                status = notification.status.as_str(),
                "notification is not pending, skipping send"
            );
            return Ok(());
        }

        let phone = match self.phones.load_by_id(&params.user_id, params.phone_id).await {
            Ok(phone) => phone.sanitize(),
            Err(err) => {
                return self
                    .record_failed(&params, format!("cannot load phone [{}]: {err}", params.phone_id))
                    .await;
            }
        };

        match self.push_to(&phone, &notification).await {
            Ok(provider_id) => self.record_sent(&params, &phone, provider_id).await,
            Err(reason) => self.record_failed(&params, reason).await,
        }
    }

    async fn push_to(&self, phone: &Phone, notification: &PhoneNotification) -> Result<String, String> {
        let token = phone
            .push_token()
            .ok_or_else(|| format!("phone [{}] has no push token", phone.id))?;

        let ttl = phone
            .message_expiration_duration()
            .to_std()
            .unwrap_or(Duration::ZERO);

        self.push
            .send(PushMessage {
                token: token.to_string(),
                data: BTreeMap::from([(
                    KEY_MESSAGE_ID.to_string(),
                    notification.message_id.to_string(),
                )]),
                ttl,
                priority: PushPriority::Normal,
            })
            .await
            .map_err(|err| err.to_string())
    }

    async fn record_sent(
        &self,
        params: &PhoneNotificationSendParams,
        phone: &Phone,
        provider_id: String,
    ) -> Result<(), ServiceError> {
        info!(
            notification_id = %params.notification_id,
            message_id = %params.message_id,
            provider_id = %provider_id,
            "notification sent to phone"
        );

        let event = Event::new(
            params.source.clone(),
            &MessageNotificationSent {
                message_id: params.message_id,
                user_id: params.user_id.clone(),
                phone_id: params.phone_id,
                notification_id: params.notification_id,
                scheduled_at: params.scheduled_at,
                message_expiration_duration: phone.message_expiration_duration().num_seconds(),
                fcm_message_id: provider_id,
                notification_sent_at: Utc::now(),
            },
        )?;
        if let Err(err) = self.publisher.dispatch(event).await {
            error!(notification_id = %params.notification_id, error = %err, "cannot dispatch notification sent event");
        }

        self.finish(params.notification_id, PhoneNotificationStatus::Sent).await
    }

    async fn record_failed(&self, params: &PhoneNotificationSendParams, reason: String) -> Result<(), ServiceError> {
        warn!(
            notification_id = %params.notification_id,
            message_id = %params.message_id,
            error = %reason,
            "cannot send notification to phone"
        );

        let event = Event::new(
            params.source.clone(),
            &MessageNotificationFailed {
                message_id: params.message_id,
                user_id: params.user_id.clone(),
                phone_id: params.phone_id,
                notification_id: params.notification_id,
                error_message: reason,
                notification_failed_at: Utc::now(),
            },
        )?;
        if let Err(err) = self.publisher.dispatch(event).await {
            error!(notification_id = %params.notification_id, error = %err, "cannot dispatch notification failed event");
        }

        self.finish(params.notification_id, PhoneNotificationStatus::Failed).await
    }

    async fn finish(&self, id: NotificationId, status: PhoneNotificationStatus) -> Result<(), ServiceError> {
        match self.notifications.update_status(id, status).await {
            Ok(_) => Ok(()),
            // Cancelled or finished concurrently; the first outcome stands.
            Err(RepositoryError::Conflict(_) | RepositoryError::NotFound(_)) => {
                warn!(notification_id = %id, status = status.as_str(), "notification changed before status update");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Drop pending notifications of a deleted message.
    pub async fn cancel_for_message(&self, user_id: &UserId, message_id: MessageId) -> Result<usize, ServiceError> {
        let removed = self
            .notifications
            .delete_pending_for_message(user_id, message_id)
            .await?;
        if removed > 0 {
            info!(message_id = %message_id, removed, "pending notifications cancelled");
        }
        Ok(removed)
    }

    pub async fn purge_user(&self, user_id: &UserId) -> Result<usize, ServiceError> {
        let removed = self.notifications.delete_all_for_user(user_id).await?;
        info!(user_id = %user_id, removed, "notifications purged for deleted account");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::InMemoryPushProvider;
    use crate::repositories::{InMemoryPhoneNotificationRepository, InMemoryPhoneRepository};
    use crate::dispatcher::{DispatchError, Dispatcher};
    use crate::event_store::InMemoryEventStore;
    use crate::push_queue::{InMemoryPushQueue, PushQueueError};
    use crate::testing::{RecordingPushQueue, queue_config, recording_dispatcher};
    use smsgate_events::EventType;

    struct Fixture {
        service: PhoneNotificationService,
        notifications: Arc<InMemoryPhoneNotificationRepository>,
        push: Arc<InMemoryPushProvider>,
        store: Arc<InMemoryEventStore>,
        queue: Arc<RecordingPushQueue>,
    }

    async fn fixture(phone: Phone, push: InMemoryPushProvider) -> Fixture {
        let phones = Arc::new(InMemoryPhoneRepository::new());
        phones.save(phone).await.unwrap();
        let notifications = Arc::new(InMemoryPhoneNotificationRepository::new());
        let push = Arc::new(push);
        let (dispatcher, store, queue) = recording_dispatcher();
        Fixture {
            service: PhoneNotificationService::new(phones, notifications.clone(), push.clone(), dispatcher),
            notifications,
            push,
            store,
            queue,
        }
    }

    fn phone() -> Phone {
        Phone::new(UserId::new("user-1"), "+100")
            .with_fcm_token("device-token")
            .with_messages_per_minute(2)
            .with_message_expiration_seconds(900)
    }

    fn schedule_params(message_id: MessageId) -> PhoneNotificationScheduleParams {
        PhoneNotificationScheduleParams {
            user_id: UserId::new("user-1"),
            owner: "+100".into(),
            contact: "+200".into(),
            content: "hello".into(),
            message_id,
            source: "test".into(),
        }
    }

    fn send_params(n: &PhoneNotification) -> PhoneNotificationSendParams {
        PhoneNotificationSendParams {
            user_id: n.user_id.clone(),
            phone_id: n.phone_id,
            message_id: n.message_id,
            notification_id: n.id,
            scheduled_at: n.scheduled_at,
            source: "test".into(),
        }
    }

    #[tokio::test]
    async fn schedule_defers_send_by_throttle_slot() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;

        for _ in 0..3 {
            f.service.schedule(schedule_params(MessageId::new())).await.unwrap();
        }

        let delays: Vec<u64> = f.queue.events().iter().map(|(_, d)| d.as_secs()).collect();
        assert_eq!(delays.len(), 3);
        assert!(delays[0] <= 1);
        assert!(delays[1] <= 1);
        assert!((58..=60).contains(&delays[2]), "third delay {}", delays[2]);
        assert!(f.queue.events().iter().all(|(e, _)| e.event_type() == EventType::MessageNotificationSend));
        assert_eq!(f.store.events_of_type(EventType::MessageNotificationScheduled).len(), 3);
    }

    #[tokio::test]
    async fn scheduling_twice_keeps_one_pending_notification() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let m = MessageId::new();

        let first = f.service.schedule(schedule_params(m)).await.unwrap();
        let second = f.service.schedule(schedule_params(m)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(f.notifications.all().len(), 1);
        assert_eq!(f.queue.tasks().len(), 1);
    }

    #[tokio::test]
    async fn send_pushes_message_id_with_expiry_ttl() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();

        f.service.send(send_params(&n)).await.unwrap();

        let sent = f.push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "device-token");
        assert_eq!(sent[0].data[KEY_MESSAGE_ID], n.message_id.to_string());
        assert_eq!(sent[0].ttl, Duration::from_secs(900));
        assert_eq!(sent[0].priority, PushPriority::Normal);

        let stored = f.notifications.load(n.id).await.unwrap();
        assert_eq!(stored.status, PhoneNotificationStatus::Sent);

        let events = f.store.events_of_type(EventType::MessageNotificationSent);
        assert_eq!(events.len(), 1);
        let payload: MessageNotificationSent = events[0].decode().unwrap();
        assert_eq!(payload.message_expiration_duration, 900);
    }

    #[tokio::test]
    async fn phone_without_token_fails_the_notification() {
        let mut tokenless = phone();
        tokenless.fcm_token = None;
        let f = fixture(tokenless, InMemoryPushProvider::new()).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();

        f.service.send(send_params(&n)).await.unwrap();

        assert!(f.push.sent().is_empty());
        assert_eq!(f.notifications.load(n.id).await.unwrap().status, PhoneNotificationStatus::Failed);
        let failed = f.store.events_of_type(EventType::MessageNotificationFailed);
        assert_eq!(failed.len(), 1);
        let payload: MessageNotificationFailed = failed[0].decode().unwrap();
        assert!(payload.error_message.contains("no push token"));
    }

    #[tokio::test]
    async fn provider_error_fails_the_notification() {
        let f = fixture(phone(), InMemoryPushProvider::failing("registration token not registered")).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();

        f.service.send(send_params(&n)).await.unwrap();

        assert_eq!(f.notifications.load(n.id).await.unwrap().status, PhoneNotificationStatus::Failed);
        assert_eq!(f.store.events_of_type(EventType::MessageNotificationFailed).len(), 1);
    }

    #[tokio::test]
    async fn cancelled_notification_is_not_sent() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();

        assert_eq!(f.service.cancel_for_message(&n.user_id, n.message_id).await.unwrap(), 1);
        f.service.send(send_params(&n)).await.unwrap();

        assert!(f.push.sent().is_empty());
        assert!(f.store.events_of_type(EventType::MessageNotificationSent).is_empty());
    }

    #[tokio::test]
    async fn second_send_is_a_no_op() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();

        f.service.send(send_params(&n)).await.unwrap();
        f.service.send(send_params(&n)).await.unwrap();

        assert_eq!(f.push.sent().len(), 1);
    }

    #[tokio::test]
    async fn unknown_phone_is_an_error() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let mut params = schedule_params(MessageId::new());
        params.owner = "+999".into();

        let err = f.service.schedule(params).await.unwrap_err();
        assert!(matches!(err, ServiceError::Repository(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_phone_at_send_time_fails_the_notification() {
        let f = fixture(phone(), InMemoryPushProvider::new()).await;
        let n = f.service.schedule(schedule_params(MessageId::new())).await.unwrap();
        let mut params = send_params(&n);
        params.phone_id = PhoneId::new();

        f.service.send(params).await.unwrap();

        assert!(f.push.sent().is_empty());
        assert_eq!(f.notifications.load(n.id).await.unwrap().status, PhoneNotificationStatus::Failed);
        assert_eq!(f.notifications.count_pending(n.phone_id).await.unwrap(), 0);
        let failed = f.store.events_of_type(EventType::MessageNotificationFailed);
        assert_eq!(failed.len(), 1);
        let payload: MessageNotificationFailed = failed[0].decode().unwrap();
        assert!(payload.error_message.contains("cannot load phone"));
    }

    #[tokio::test]
    async fn failed_deferral_does_not_hold_a_throttle_slot() {
        let phones = Arc::new(InMemoryPhoneRepository::new());
        phones.save(phone()).await.unwrap();
        let notifications = Arc::new(InMemoryPhoneNotificationRepository::new());
        let store = Arc::new(InMemoryEventStore::new());
        let dispatcher = Dispatcher::new(store, Arc::new(InMemoryPushQueue::new("unbound")), queue_config());
        let service = PhoneNotificationService::new(
            phones,
            notifications.clone(),
            Arc::new(InMemoryPushProvider::new()),
            dispatcher,
        );

        for _ in 0..3 {
            let err = service.schedule(schedule_params(MessageId::new())).await.unwrap_err();
            assert!(matches!(
                err,
                ServiceError::Dispatch(DispatchError::Queue(PushQueueError::Unbound(_)))
            ));
        }

        let all = notifications.all();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|n| n.status == PhoneNotificationStatus::Failed));
        assert!(all.iter().all(|n| n.scheduled_at == n.created_at));
    }
}
