//! Redis-backed counter store.
//!
//! `INCR` is atomic on the server, so concurrent requests never lose an
//! update and no in-process lock is needed. The connection manager
//! multiplexes every request over one connection and reconnects on its own.

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError};
use async_trait::async_trait;

use super::{redact, CounterError, CounterStore};

#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisCounterStore {
    /// Connect to `url` (e.g. `redis://redis:6379/0`).
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, CounterError> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| CounterError::BackendUnavailable("connect timed out".into()))?
            .map_err(unavailable)?;

        tracing::info!(url = %redact(url), "Connected to counter store");
        Ok(Self { conn, timeout })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, name: &str) -> Result<u64, CounterError> {
        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("INCR").arg(name).to_owned();
        let value: u64 = tokio::time::timeout(self.timeout, cmd.query_async(&mut conn))
            .await
            .map_err(|_| CounterError::BackendUnavailable("INCR timed out".into()))?
            .map_err(unavailable)?;
        Ok(value)
    }

    async fn ping(&self) -> Result<(), CounterError> {
        let mut conn = self.conn.clone();
        let cmd = ::redis::cmd("PING");
        let _: String = tokio::time::timeout(self.timeout, cmd.query_async(&mut conn))
            .await
            .map_err(|_| CounterError::BackendUnavailable("PING timed out".into()))?
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(err: RedisError) -> CounterError {
    CounterError::BackendUnavailable(err.to_string())
}
