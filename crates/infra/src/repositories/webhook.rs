use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use smsgate_core::{UserId, Webhook, WebhookId};

use super::RepositoryError;

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Webhooks of `user_id` subscribed to `event_type` on `phone_number`.
    async fn load_by_event(
        &self,
        user_id: &UserId,
        event_type: &str,
        phone_number: &str,
    ) -> Result<Vec<Webhook>, RepositoryError>;

    async fn save(&self, webhook: Webhook) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryWebhookRepository {
    webhooks: RwLock<HashMap<WebhookId, Webhook>>,
}

impl InMemoryWebhookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WebhookRepository for InMemoryWebhookRepository {
    async fn load_by_event(
        &self,
        user_id: &UserId,
        event_type: &str,
        phone_number: &str,
    ) -> Result<Vec<Webhook>, RepositoryError> {
        let webhooks = self.webhooks.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(webhooks
            .values()
            .filter(|w| &w.user_id == user_id && w.matches(event_type, phone_number))
            .cloned()
            .collect())
    }

    async fn save(&self, webhook: Webhook) -> Result<(), RepositoryError> {
        let mut webhooks = self.webhooks.write().map_err(|_| RepositoryError::poisoned())?;
        webhooks.insert(webhook.id, webhook);
        Ok(())
    }
}
