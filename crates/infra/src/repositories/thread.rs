use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use smsgate_core::{MessageThread, ThreadId, UserId};

use super::RepositoryError;

#[async_trait]
pub trait MessageThreadRepository: Send + Sync {
    /// Insert a new thread. Fails with `Conflict` if the (user, owner, contact) key exists.
    async fn store(&self, thread: MessageThread) -> Result<(), RepositoryError>;

    async fn update(&self, thread: MessageThread) -> Result<(), RepositoryError>;

    async fn load(&self, user_id: &UserId, thread_id: ThreadId) -> Result<MessageThread, RepositoryError>;

    async fn load_by_owner_contact(
        &self,
        user_id: &UserId,
        owner: &str,
        contact: &str,
    ) -> Result<MessageThread, RepositoryError>;

    async fn delete(&self, user_id: &UserId, thread_id: ThreadId) -> Result<(), RepositoryError>;

    /// Threads for one owner number, most recent first.
    async fn index(
        &self,
        user_id: &UserId,
        owner: &str,
        is_archived: bool,
    ) -> Result<Vec<MessageThread>, RepositoryError>;

    /// Remove every thread of a user; returns how many were removed.
    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryMessageThreadRepository {
    threads: RwLock<HashMap<ThreadId, MessageThread>>,
}

impl InMemoryMessageThreadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.threads.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn same_key(thread: &MessageThread, user_id: &UserId, owner: &str, contact: &str) -> bool {
    &thread.user_id == user_id && thread.owner == owner && thread.contact == contact
}

#[async_trait]
impl MessageThreadRepository for InMemoryMessageThreadRepository {
    async fn store(&self, thread: MessageThread) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().map_err(|_| RepositoryError::poisoned())?;
        if threads
            .values()
            .any(|t| same_key(t, &thread.user_id, &thread.owner, &thread.contact))
        {
            return Err(RepositoryError::Conflict(format!(
                "thread between {} and {} already exists",
                thread.owner, thread.contact
            )));
        }
        threads.insert(thread.id, thread);
        Ok(())
    }

    async fn update(&self, thread: MessageThread) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().map_err(|_| RepositoryError::poisoned())?;
        match threads.get_mut(&thread.id) {
            Some(existing) => {
                *existing = thread;
                Ok(())
            }
            None => Err(RepositoryError::not_found(format!("thread {}", thread.id))),
        }
    }

    async fn load(&self, user_id: &UserId, thread_id: ThreadId) -> Result<MessageThread, RepositoryError> {
        let threads = self.threads.read().map_err(|_| RepositoryError::poisoned())?;
        threads
            .get(&thread_id)
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("thread {thread_id}")))
    }

    async fn load_by_owner_contact(
        &self,
        user_id: &UserId,
        owner: &str,
        contact: &str,
    ) -> Result<MessageThread, RepositoryError> {
        let threads = self.threads.read().map_err(|_| RepositoryError::poisoned())?;
        threads
            .values()
            .find(|t| same_key(t, user_id, owner, contact))
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found(format!("thread between {owner} and {contact}"))
            })
    }

    async fn delete(&self, user_id: &UserId, thread_id: ThreadId) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().map_err(|_| RepositoryError::poisoned())?;
        match threads.get(&thread_id) {
            Some(t) if &t.user_id == user_id => {
                threads.remove(&thread_id);
                Ok(())
            }
            _ => Err(RepositoryError::not_found(format!("thread {thread_id}"))),
        }
    }

    async fn index(
        &self,
        user_id: &UserId,
        owner: &str,
        is_archived: bool,
    ) -> Result<Vec<MessageThread>, RepositoryError> {
        let threads = self.threads.read().map_err(|_| RepositoryError::poisoned())?;
        let mut found: Vec<MessageThread> = threads
            .values()
            .filter(|t| &t.user_id == user_id && t.owner == owner && t.is_archived == is_archived)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.order_timestamp.cmp(&a.order_timestamp));
        Ok(found)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        let mut threads = self.threads.write().map_err(|_| RepositoryError::poisoned())?;
        let before = threads.len();
        threads.retain(|_, t| &t.user_id != user_id);
        Ok(before - threads.len())
    }
}
