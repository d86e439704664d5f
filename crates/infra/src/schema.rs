//! Postgres schema for the stores that have a Postgres implementation.

use sqlx::PgPool;
use tracing::info;

/// Statements of `migrations/0001_pipeline.sql`; every statement is idempotent.
pub const PIPELINE_SCHEMA: &str = include_str!("../migrations/0001_pipeline.sql");

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(PIPELINE_SCHEMA).execute(pool).await?;
    info!("pipeline schema applied");
    Ok(())
}
