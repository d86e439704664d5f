//! Message thread aggregation.
//!
//! Updates for one (user, owner, contact) key are serialized in-process through a
//! small set of striped locks, so a load-evaluate-write cycle never interleaves with
//! another for the same thread. Keys that hash to different stripes proceed in
//! parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use smsgate_core::thread::random_color;
use smsgate_core::{MessageThread, ThreadId, ThreadUpdate, UpdateDecision, UserId};
use smsgate_events::MessageApiDeleted;

use super::ServiceError;
use crate::repositories::{MessageThreadRepository, RepositoryError};

const LOCK_STRIPES: usize = 32;

pub struct MessageThreadService {
    repository: Arc<dyn MessageThreadRepository>,
    stripes: Vec<Mutex<()>>,
}

impl MessageThreadService {
    pub fn new(repository: Arc<dyn MessageThreadRepository>) -> Self {
        Self {
            repository,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn stripe(&self, user_id: &UserId, owner: &str, contact: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        (user_id, owner, contact).hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % LOCK_STRIPES]
    }

    /// Apply a lifecycle update to the thread of its (owner, contact) pair,
    /// creating the thread if this is the first message between them.
    pub async fn update_thread(&self, update: ThreadUpdate) -> Result<UpdateDecision, ServiceError> {
        let _guard = self
            .stripe(&update.user_id, &update.owner, &update.contact)
            .lock()
            .await;

        let mut thread = match self
            .repository
            .load_by_owner_contact(&update.user_id, &update.owner, &update.contact)
            .await
        {
            Ok(thread) => thread,
            Err(RepositoryError::NotFound(_)) => return self.create_thread(&update).await,
            Err(err) => return Err(err.into()),
        };

        let decision = thread.try_apply(&update);
        if !decision.is_accepted() {
            info!(
                thread_id = %thread.id,
                thread_status = %thread.status,
                thread_timestamp = %thread.order_timestamp,
                message_id = %update.message_id,
                status = %update.status,
                timestamp = %update.timestamp,
                decision = ?decision,
                "thread update rejected"
            );
            return Ok(decision);
        }

        self.repository.update(thread.clone()).await?;
        info!(
            thread_id = %thread.id,
            message_id = %thread.last_message_id,
            status = %thread.status,
            "thread updated"
        );
        Ok(decision)
    }

    async fn create_thread(&self, update: &ThreadUpdate) -> Result<UpdateDecision, ServiceError> {
        let thread = MessageThread::from_update(update, random_color());
        let thread_id = thread.id;

        match self.repository.store(thread).await {
            Ok(()) => {
                info!(
                    thread_id = %thread_id,
                    message_id = %update.message_id,
                    owner = %update.owner,
                    contact = %update.contact,
                    "thread created"
                );
                Ok(UpdateDecision::Accept)
            }
            // Another process created it first; fall back to the update path.
            Err(RepositoryError::Conflict(_)) => {
                let mut existing = self
                    .repository
                    .load_by_owner_contact(&update.user_id, &update.owner, &update.contact)
                    .await?;
                let decision = existing.try_apply(update);
                if decision.is_accepted() {
                    self.repository.update(existing).await?;
                }
                Ok(decision)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Repoint or remove a thread whose head message was deleted.
    pub async fn update_after_deletion(&self, payload: &MessageApiDeleted) -> Result<(), ServiceError> {
        let _guard = self
            .stripe(&payload.user_id, &payload.owner, &payload.contact)
            .lock()
            .await;

        let mut thread = match self
            .repository
            .load_by_owner_contact(&payload.user_id, &payload.owner, &payload.contact)
            .await
        {
            Ok(thread) => thread,
            Err(RepositoryError::NotFound(_)) => {
                info!(message_id = %payload.message_id, "no thread for deleted message");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if thread.last_message_id != payload.message_id {
            return Ok(());
        }

        match payload.previous_message_id {
            Some(previous_id) => {
                thread.rollback(
                    previous_id,
                    payload.previous_message_content.clone().unwrap_or_default(),
                    payload.previous_message_status.unwrap_or(thread.status),
                );
                self.repository.update(thread.clone()).await?;
                info!(
                    thread_id = %thread.id,
                    message_id = %previous_id,
                    "thread rolled back to previous message"
                );
            }
            None => {
                self.repository.delete(&thread.user_id, thread.id).await?;
                info!(thread_id = %thread.id, "thread deleted with its last message");
            }
        }
        Ok(())
    }

    pub async fn update_archive(
        &self,
        user_id: &UserId,
        thread_id: ThreadId,
        is_archived: bool,
    ) -> Result<MessageThread, ServiceError> {
        let mut thread = self.repository.load(user_id, thread_id).await?;
        thread.set_archived(is_archived);
        self.repository.update(thread.clone()).await?;
        info!(thread_id = %thread.id, is_archived, "thread archive status updated");
        Ok(thread)
    }

    pub async fn get_threads(
        &self,
        user_id: &UserId,
        owner: &str,
        is_archived: bool,
    ) -> Result<Vec<MessageThread>, ServiceError> {
        Ok(self.repository.index(user_id, owner, is_archived).await?)
    }

    /// Explicit user deletion. A thread that is already gone is not an error.
    pub async fn delete_thread(&self, user_id: &UserId, thread_id: ThreadId) -> Result<(), ServiceError> {
        match self.repository.delete(user_id, thread_id).await {
            Ok(()) => {
                info!(thread_id = %thread_id, "thread deleted");
                Ok(())
            }
            Err(RepositoryError::NotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn purge_user(&self, user_id: &UserId) -> Result<usize, ServiceError> {
        let removed = self.repository.delete_all_for_user(user_id).await?;
        info!(user_id = %user_id, removed, "threads purged for deleted account");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::InMemoryMessageThreadRepository;
    use chrono::{DateTime, TimeZone, Utc};
    use smsgate_core::{MessageId, MessageStatus};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn update(message_id: MessageId, status: MessageStatus, secs: i64) -> ThreadUpdate {
        ThreadUpdate {
            user_id: UserId::new("user-1"),
            owner: "+100".into(),
            contact: "+200".into(),
            message_id,
            content: format!("{status}"),
            status,
            timestamp: at(secs),
        }
    }

    fn service() -> (MessageThreadService, Arc<InMemoryMessageThreadRepository>) {
        let repo = Arc::new(InMemoryMessageThreadRepository::new());
        (MessageThreadService::new(repo.clone()), repo)
    }

    async fn current(repo: &InMemoryMessageThreadRepository) -> MessageThread {
        repo.load_by_owner_contact(&UserId::new("user-1"), "+100", "+200")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_update_creates_the_thread() {
        let (service, repo) = service();
        let m = MessageId::new();

        let decision = service.update_thread(update(m, MessageStatus::Pending, 0)).await.unwrap();

        assert_eq!(decision, UpdateDecision::Accept);
        let thread = current(&repo).await;
        assert_eq!(thread.last_message_id, m);
        assert_eq!(thread.status, MessageStatus::Pending);
        assert!(!thread.is_archived);
        assert!(smsgate_core::thread::COLORS.contains(&thread.color.as_str()));
    }

    #[tokio::test]
    async fn out_of_order_events_converge_to_sent() {
        for order in [[10, 5], [5, 10]] {
            let (service, repo) = service();
            let m = MessageId::new();
            let sending = update(m, MessageStatus::Sending, 10);
            let sent = update(m, MessageStatus::Sent, 5);
            let events = if order == [10, 5] { [sending, sent] } else { [sent, sending] };

            for e in events {
                service.update_thread(e).await.unwrap();
            }
            assert_eq!(current(&repo).await.status, MessageStatus::Sent, "order {order:?}");
        }
    }

    #[tokio::test]
    async fn concurrent_first_updates_produce_one_thread() {
        let (service, repo) = service();
        let service = Arc::new(service);
        let m = MessageId::new();

        let a = tokio::spawn({
            let service = service.clone();
            async move { service.update_thread(update(m, MessageStatus::Pending, 0)).await }
        });
        let b = tokio::spawn({
            let service = service.clone();
            async move { service.update_thread(update(m, MessageStatus::Scheduled, 1)).await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(current(&repo).await.status, MessageStatus::Scheduled);
    }

    #[tokio::test]
    async fn deleting_head_rolls_back_to_previous_message() {
        let (service, repo) = service();
        let first = MessageId::new();
        let second = MessageId::new();
        service.update_thread(update(first, MessageStatus::Delivered, 0)).await.unwrap();
        service.update_thread(update(second, MessageStatus::Sent, 10)).await.unwrap();

        service
            .update_after_deletion(&MessageApiDeleted {
                message_id: second,
                user_id: UserId::new("user-1"),
                owner: "+100".into(),
                contact: "+200".into(),
                content: "sent".into(),
                timestamp: at(20),
                previous_message_id: Some(first),
                previous_message_status: Some(MessageStatus::Delivered),
                previous_message_content: Some("delivered".into()),
            })
            .await
            .unwrap();

        let thread = current(&repo).await;
        assert_eq!(thread.last_message_id, first);
        assert_eq!(thread.status, MessageStatus::Delivered);
        assert_eq!(thread.last_message_content, "delivered");
    }

    #[tokio::test]
    async fn deleting_the_only_message_removes_the_thread() {
        let (service, repo) = service();
        let m = MessageId::new();
        service.update_thread(update(m, MessageStatus::Sent, 0)).await.unwrap();

        service
            .update_after_deletion(&MessageApiDeleted {
                message_id: m,
                user_id: UserId::new("user-1"),
                owner: "+100".into(),
                contact: "+200".into(),
                content: "sent".into(),
                timestamp: at(20),
                previous_message_id: None,
                previous_message_status: None,
                previous_message_content: None,
            })
            .await
            .unwrap();

        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn deleting_an_older_message_leaves_the_thread() {
        let (service, repo) = service();
        let old = MessageId::new();
        let head = MessageId::new();
        service.update_thread(update(head, MessageStatus::Sent, 0)).await.unwrap();

        service
            .update_after_deletion(&MessageApiDeleted {
                message_id: old,
                user_id: UserId::new("user-1"),
                owner: "+100".into(),
                contact: "+200".into(),
                content: "old".into(),
                timestamp: at(20),
                previous_message_id: None,
                previous_message_status: None,
                previous_message_content: None,
            })
            .await
            .unwrap();

        assert_eq!(current(&repo).await.last_message_id, head);
    }

    #[tokio::test]
    async fn archive_and_listing() {
        let (service, _) = service();
        let user = UserId::new("user-1");
        service.update_thread(update(MessageId::new(), MessageStatus::Sent, 0)).await.unwrap();
        let mut other = update(MessageId::new(), MessageStatus::Sent, 50);
        other.contact = "+300".into();
        service.update_thread(other).await.unwrap();

        let threads = service.get_threads(&user, "+100", false).await.unwrap();
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].contact, "+300");

        service.update_archive(&user, threads[0].id, true).await.unwrap();
        assert_eq!(service.get_threads(&user, "+100", false).await.unwrap().len(), 1);
        assert_eq!(service.get_threads(&user, "+100", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_removes_only_that_user() {
        let (service, repo) = service();
        service.update_thread(update(MessageId::new(), MessageStatus::Sent, 0)).await.unwrap();
        let mut stranger = update(MessageId::new(), MessageStatus::Sent, 0);
        stranger.user_id = UserId::new("user-2");
        service.update_thread(stranger).await.unwrap();

        assert_eq!(service.purge_user(&UserId::new("user-1")).await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }
}
