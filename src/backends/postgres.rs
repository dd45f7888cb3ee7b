//! Postgres-backed append log.
//!
//! Each append is a single autocommitted `INSERT`; when `execute` returns
//! `Ok` the row is committed. The `access_log` table is provisioned outside
//! this service.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use super::{redact, AppendError, AppendLogStore, LogRecord};
use crate::config::AppendLogConfig;

const INSERT_ACCESS_LOG: &str = "INSERT INTO access_log (timestamp) VALUES ($1)";

#[derive(Clone)]
pub struct PgAppendLog {
    pool: Pool<Postgres>,
    timeout: Duration,
}

impl PgAppendLog {
    /// Build the shared pool and verify one connection can be opened.
    pub async fn connect(config: &AppendLogConfig, timeout: Duration) -> Result<Self, AppendError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.dsn)
            .await
            .map_err(classify)?;

        tracing::info!(
            dsn = %redact(&config.dsn),
            max_connections = config.max_connections,
            "Connected to append log"
        );
        Ok(Self { pool, timeout })
    }
}

#[async_trait]
impl AppendLogStore for PgAppendLog {
    async fn append(&self, record: &LogRecord) -> Result<(), AppendError> {
        let query = sqlx::query(INSERT_ACCESS_LOG).bind(record.timestamp);
        tokio::time::timeout(self.timeout, query.execute(&self.pool))
            .await
            .map_err(|_| AppendError::Timeout)?
            .map_err(classify)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppendError> {
        tokio::time::timeout(self.timeout, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| AppendError::Timeout)?
            .map_err(classify)?;
        Ok(())
    }
}

/// Map a driver error onto the append log's error kinds.
fn classify(err: sqlx::Error) -> AppendError {
    match &err {
        sqlx::Error::PoolTimedOut => AppendError::Timeout,
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => AppendError::ConstraintViolation(db.message().to_string()),
            _ => AppendError::ConnectionFailure(err.to_string()),
        },
        _ => AppendError::ConnectionFailure(err.to_string()),
    }
}
