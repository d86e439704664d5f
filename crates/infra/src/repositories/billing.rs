use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use smsgate_core::{BillingUsage, UserId};
use smsgate_core::billing::month_bounds;

use super::RepositoryError;

#[async_trait]
pub trait BillingUsageRepository: Send + Sync {
    async fn register_sent_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    async fn register_received_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Usage for the month containing `at`; zeroed if nothing was recorded yet.
    async fn get_current(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<BillingUsage, RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryBillingUsageRepository {
    usage: Mutex<HashMap<(UserId, DateTime<Utc>), BillingUsage>>,
}

impl InMemoryBillingUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, user_id: &UserId, at: DateTime<Utc>, f: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut BillingUsage),
    {
        let mut usage = self.usage.lock().map_err(|_| RepositoryError::poisoned())?;
        let (start, _) = month_bounds(at);
        let entry = usage
            .entry((user_id.clone(), start))
            .or_insert_with(|| BillingUsage::for_month(user_id.clone(), at));
        f(entry);
        Ok(())
    }
}

#[async_trait]
impl BillingUsageRepository for InMemoryBillingUsageRepository {
    async fn register_sent_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.update(user_id, at, |u| u.sent_messages += 1)
    }

    async fn register_received_message(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.update(user_id, at, |u| u.received_messages += 1)
    }

    async fn get_current(&self, user_id: &UserId, at: DateTime<Utc>) -> Result<BillingUsage, RepositoryError> {
        let usage = self.usage.lock().map_err(|_| RepositoryError::poisoned())?;
        let (start, _) = month_bounds(at);
        Ok(usage
            .get(&(user_id.clone(), start))
            .cloned()
            .unwrap_or_else(|| BillingUsage::for_month(user_id.clone(), at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn counters_are_kept_per_month() {
        let repo = InMemoryBillingUsageRepository::new();
        let user = UserId::new("u");
        let jan = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();

        repo.register_sent_message(&user, jan).await.unwrap();
        repo.register_sent_message(&user, jan).await.unwrap();
        repo.register_received_message(&user, feb).await.unwrap();

        let january = repo.get_current(&user, jan).await.unwrap();
        assert_eq!((january.sent_messages, january.received_messages), (2, 0));
        let february = repo.get_current(&user, feb).await.unwrap();
        assert_eq!((february.sent_messages, february.received_messages), (0, 1));
    }
}
