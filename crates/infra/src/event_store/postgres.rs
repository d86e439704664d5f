//! Postgres-backed event store implementation.
//!
//! Events live in the `events` table, one row per event id. `position` is a
//! `BIGSERIAL` that preserves insertion order for `fetch_all`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | EventStoreError |
//! |------------|-----------------|
//! | Database (any code) | `Storage` |
//! | PoolClosed | `Storage` |
//! | Row decode failure | `Serialization` |
//! | Other | `Storage` |
//!
//! Duplicate ids never surface as errors: inserts use `ON CONFLICT (id) DO NOTHING`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use smsgate_events::{Event, EventType};

use super::r#trait::{EventStore, EventStoreError};

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[instrument(
        skip(self, event),
        fields(event_id = %event.id(), event_type = %event.event_type()),
        err
    )]
    async fn save(&self, event: &Event) -> Result<(), EventStoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id,
                type,
                source,
                time,
                data
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(event.id())
        .bind(event.event_type().as_str())
        .bind(event.source())
        .bind(event.time())
        .bind(event.data())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save", e))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn fetch_all(&self) -> Result<Vec<Event>, EventStoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT id, type, source, time, data
            FROM events
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_all", e))?;

        rows.into_iter().map(EventRow::into_event).collect()
    }
}

#[derive(Debug)]
struct EventRow {
    id: String,
    event_type: String,
    source: String,
    time: DateTime<Utc>,
    data: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for EventRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EventRow {
            id: row.try_get("id")?,
            event_type: row.try_get("type")?,
            source: row.try_get("source")?,
            time: row.try_get("time")?,
            data: row.try_get("data")?,
        })
    }
}

impl EventRow {
    fn into_event(self) -> Result<Event, EventStoreError> {
        let event_type: EventType = self
            .event_type
            .parse()
            .map_err(|e| EventStoreError::Serialization(format!("row {}: {e}", self.id)))?;
        Ok(Event::from_parts(
            self.id,
            event_type,
            self.source,
            self.time,
            self.data,
        ))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => EventStoreError::Storage(format!(
            "database error in {}: {}",
            operation,
            db_err.message()
        )),
        sqlx::Error::PoolClosed => {
            EventStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            EventStoreError::Serialization(format!("cannot decode row in {}: {}", operation, err))
        }
        _ => EventStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
