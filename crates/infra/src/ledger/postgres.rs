//! Postgres-backed ledger over `event_listener_logs`.
//!
//! `(event_id, handler)` carries a unique constraint; a second `store` for the same
//! key hits `ON CONFLICT DO NOTHING` and succeeds without writing.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::{EventListenerLedger, EventListenerLog, LedgerError};

#[derive(Debug, Clone)]
pub struct PostgresEventListenerLedger {
    pool: Arc<PgPool>,
}

impl PostgresEventListenerLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl EventListenerLedger for PostgresEventListenerLedger {
    #[instrument(skip(self), err)]
    async fn has(&self, event_id: &str, handler: &str) -> Result<bool, LedgerError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM event_listener_logs
                WHERE event_id = $1 AND handler = $2
            )
            "#,
        )
        .bind(event_id)
        .bind(handler)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("has", e))?;

        Ok(exists)
    }

    #[instrument(
        skip(self, entry),
        fields(event_id = %entry.event_id, handler = %entry.handler),
        err
    )]
    async fn store(&self, entry: EventListenerLog) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            INSERT INTO event_listener_logs (
                id,
                event_id,
                event_type,
                handler,
                duration_ms,
                handled_at,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (event_id, handler) DO NOTHING
            "#,
        )
        .bind(entry.id)
        .bind(&entry.event_id)
        .bind(entry.event_type.as_str())
        .bind(&entry.handler)
        .bind(i64::try_from(entry.duration.as_millis()).unwrap_or(i64::MAX))
        .bind(entry.handled_at)
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("store", e))?;

        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => LedgerError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            LedgerError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => LedgerError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
