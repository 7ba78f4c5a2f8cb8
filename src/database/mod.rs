pub mod schema;

pub use schema::*;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

#[instrument]
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    info!("Connected to database");
    Ok(pool)
}

/// Creates any missing tables. Safe to run on every start.
#[instrument(skip(pool))]
pub async fn apply_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    sqlx::raw_sql(CURRENT_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to apply schema: {}", e)))?;

    info!("Schema applied");
    Ok(())
}
