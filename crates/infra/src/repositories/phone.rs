use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use smsgate_core::{Phone, PhoneId, UserId};

use super::RepositoryError;

#[async_trait]
pub trait PhoneRepository: Send + Sync {
    /// The phone registered for `owner` (its phone number).
    async fn load(&self, user_id: &UserId, owner: &str) -> Result<Phone, RepositoryError>;

    async fn load_by_id(&self, user_id: &UserId, phone_id: PhoneId) -> Result<Phone, RepositoryError>;

    async fn save(&self, phone: Phone) -> Result<(), RepositoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPhoneRepository {
    phones: RwLock<HashMap<PhoneId, Phone>>,
}

impl InMemoryPhoneRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhoneRepository for InMemoryPhoneRepository {
    async fn load(&self, user_id: &UserId, owner: &str) -> Result<Phone, RepositoryError> {
        let phones = self.phones.read().map_err(|_| RepositoryError::poisoned())?;
        phones
            .values()
            .find(|p| &p.user_id == user_id && p.phone_number == owner)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::not_found(format!("phone with owner {owner} for user {user_id}"))
            })
    }

    async fn load_by_id(&self, user_id: &UserId, phone_id: PhoneId) -> Result<Phone, RepositoryError> {
        let phones = self.phones.read().map_err(|_| RepositoryError::poisoned())?;
        phones
            .get(&phone_id)
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(format!("phone {phone_id} for user {user_id}")))
    }

    async fn save(&self, phone: Phone) -> Result<(), RepositoryError> {
        let mut phones = self.phones.write().map_err(|_| RepositoryError::poisoned())?;
        phones.insert(phone.id, phone);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn phones_are_scoped_to_their_user() {
        let repo = InMemoryPhoneRepository::new();
        let phone = Phone::new(UserId::new("alice"), "+100");
        repo.save(phone.clone()).await.unwrap();

        assert_eq!(repo.load(&UserId::new("alice"), "+100").await.unwrap(), phone);
        assert!(repo.load(&UserId::new("bob"), "+100").await.unwrap_err().is_not_found());
        assert!(repo.load_by_id(&UserId::new("bob"), phone.id).await.is_err());
    }
}
