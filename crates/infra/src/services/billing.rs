//! Monthly message usage counters.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use smsgate_core::{BillingUsage, UserId};

use super::ServiceError;
use crate::repositories::BillingUsageRepository;

pub struct BillingService {
    repository: Arc<dyn BillingUsageRepository>,
}

impl BillingService {
    pub fn new(repository: Arc<dyn BillingUsageRepository>) -> Self {
        Self { repository }
    }

    pub async fn register_sent_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.repository.register_sent_message(user_id, at).await?;
        info!(user_id = %user_id, "sent message counted");
        Ok(())
    }

    pub async fn register_received_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.repository.register_received_message(user_id, at).await?;
        info!(user_id = %user_id, "received message counted");
        Ok(())
    }

    pub async fn current_usage(&self, user_id: &UserId) -> Result<BillingUsage, ServiceError> {
        Ok(self.repository.get_current(user_id, Utc::now()).await?)
    }
}
