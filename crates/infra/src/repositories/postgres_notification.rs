//! Postgres-backed notification repository.
//!
//! `schedule` runs in a transaction holding a transaction-scoped advisory lock keyed
//! by the phone id, so concurrent schedules for one phone see each other's inserts
//! and the throttle never under-counts. Schedules for different phones do not block
//! each other.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use smsgate_core::{
    MessageId, NotificationId, PhoneId, PhoneNotification, PhoneNotificationStatus, UserId,
    throttle_delay,
};

use super::RepositoryError;
use super::notification::{PhoneNotificationRepository, Scheduled};

const SELECT_COLUMNS: &str =
    "id, message_id, user_id, phone_id, status, scheduled_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresPhoneNotificationRepository {
    pool: Arc<PgPool>,
}

impl PostgresPhoneNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl PhoneNotificationRepository for PostgresPhoneNotificationRepository {
    #[instrument(
        skip(self, notification),
        fields(phone_id = %notification.phone_id, notification_id = %notification.id),
        err
    )]
    async fn schedule(
        &self,
        messages_per_minute: u32,
        mut notification: PhoneNotification,
    ) -> Result<Scheduled, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(notification.phone_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_phone", e))?;

        let existing: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM phone_notifications
            WHERE phone_id = $1 AND message_id = $2 AND status = 'pending'
            LIMIT 1
            "#
        ))
        .bind(notification.phone_id.as_uuid())
        .bind(notification.message_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("find_pending", e))?;

        if let Some(row) = existing {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            return row.into_notification().map(Scheduled::Existing);
        }

        let pending: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM phone_notifications
            WHERE phone_id = $1 AND status = 'pending'
            "#,
        )
        .bind(notification.phone_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("count_pending", e))?;

        notification.scheduled_at +=
            throttle_delay(usize::try_from(pending).unwrap_or(0), messages_per_minute);

        sqlx::query(
            r#"
            INSERT INTO phone_notifications (
                id,
                message_id,
                user_id,
                phone_id,
                status,
                scheduled_at,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.message_id.as_uuid())
        .bind(notification.user_id.as_str())
        .bind(notification.phone_id.as_uuid())
        .bind(notification.status.as_str())
        .bind(notification.scheduled_at)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_notification", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Scheduled::New(notification))
    }

    async fn load(&self, notification_id: NotificationId) -> Result<PhoneNotification, RepositoryError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM phone_notifications WHERE id = $1"
        ))
        .bind(notification_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load", e))?;

        row.ok_or_else(|| RepositoryError::not_found(format!("notification {notification_id}")))?
            .into_notification()
    }

    #[instrument(skip(self), fields(notification_id = %notification_id), err)]
    async fn update_status(
        &self,
        notification_id: NotificationId,
        status: PhoneNotificationStatus,
    ) -> Result<PhoneNotification, RepositoryError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE phone_notifications
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(notification_id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?;

        match row {
            Some(row) => row.into_notification(),
            None => {
                // Either missing or already terminal; tell the two apart for the caller.
                let existing = self.load(notification_id).await?;
                Err(RepositoryError::Conflict(format!(
                    "notification {} is already {}",
                    notification_id,
                    existing.status.as_str()
                )))
            }
        }
    }

    async fn count_pending(&self, phone_id: PhoneId) -> Result<usize, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM phone_notifications WHERE phone_id = $1 AND status = 'pending'",
        )
        .bind(phone_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_pending", e))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn delete_pending_for_message(
        &self,
        user_id: &UserId,
        message_id: MessageId,
    ) -> Result<usize, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM phone_notifications
            WHERE user_id = $1 AND message_id = $2 AND status = 'pending'
            "#,
        )
        .bind(user_id.as_str())
        .bind(message_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_pending_for_message", e))?;

        Ok(result.rows_affected() as usize)
    }

    async fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize, RepositoryError> {
        let result = sqlx::query("DELETE FROM phone_notifications WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_all_for_user", e))?;

        Ok(result.rows_affected() as usize)
    }
}

#[derive(Debug)]
struct NotificationRow {
    id: Uuid,
    message_id: Uuid,
    user_id: String,
    phone_id: Uuid,
    status: String,
    scheduled_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for NotificationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(NotificationRow {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            user_id: row.try_get("user_id")?,
            phone_id: row.try_get("phone_id")?,
            status: row.try_get("status")?,
            scheduled_at: row.try_get("scheduled_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl NotificationRow {
    fn into_notification(self) -> Result<PhoneNotification, RepositoryError> {
        let status = PhoneNotificationStatus::parse(&self.status)
            .map_err(|e| RepositoryError::Storage(format!("row {}: {e}", self.id)))?;
        Ok(PhoneNotification {
            id: NotificationId::from_uuid(self.id),
            message_id: MessageId::from_uuid(self.message_id),
            user_id: UserId::new(self.user_id),
            phone_id: PhoneId::from_uuid(self.phone_id),
            status,
            scheduled_at: self.scheduled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => RepositoryError::Conflict(msg),
                _ => RepositoryError::Storage(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            RepositoryError::NotFound(format!("row not found in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => RepositoryError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
