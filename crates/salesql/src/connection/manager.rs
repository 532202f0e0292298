use super::postgres::PgConnector;
use super::retry::RetryPolicy;
use super::{Connector, DbHandle};
use crate::config::DbConfig;
use crate::error::{SqlError, SqlResult};
use crate::qb::{placeholder, BuiltQuery, Params};
use crate::row::Record;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

const MAX_LOGGED_SQL: usize = 200;

fn truncate_sql(sql: &str) -> &str {
    if sql.len() <= MAX_LOGGED_SQL {
        return sql;
    }
    let mut end = MAX_LOGGED_SQL;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

/// Counters exposed by [`ConnectionManager::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Handles opened, including replacements.
    pub handles_created: u64,
    /// Handles replaced after a failure or a stale check.
    pub reconnects: u64,
    /// Statement attempts repeated after a transient error.
    pub retries: u64,
}

#[derive(Default)]
struct StatsCounters {
    handles_created: AtomicU64,
    reconnects: AtomicU64,
    retries: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            handles_created: self.handles_created.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Owner of the process-wide database handle.
///
/// - `connect` creates the handle, keeps a healthy one, replaces a stale one.
/// - `get_connection` never waits on a connect in progress.
/// - `execute` retries transient failures per [`RetryPolicy`], reconnecting
///   between attempts.
pub struct ConnectionManager<C: Connector = PgConnector> {
    connector: C,
    retry: RetryPolicy,
    /// Current handle. The write lock is only held for the pointer swap.
    slot: RwLock<Option<Arc<C::Handle>>>,
    /// Serializes create-or-replace; holds the settings of the last successful connect.
    connect_lock: Mutex<Option<DbConfig>>,
    stats: StatsCounters,
}

impl ConnectionManager<PgConnector> {
    /// Manager backed by tokio-postgres.
    pub fn new() -> Self {
        Self::with_connector(PgConnector)
    }
}

impl Default for ConnectionManager<PgConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            retry: RetryPolicy::default(),
            slot: RwLock::new(None),
            connect_lock: Mutex::new(None),
            stats: StatsCounters::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    // ==================== Handle slot ====================

    fn current(&self) -> Option<Arc<C::Handle>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap(&self, handle: Option<Arc<C::Handle>>) -> Option<Arc<C::Handle>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, handle)
    }

    fn healthy_current(&self) -> Option<Arc<C::Handle>> {
        self.current().filter(|h| h.is_healthy())
    }

    async fn open(&self, config: &DbConfig) -> SqlResult<Arc<C::Handle>> {
        let handle = Arc::new(self.connector.connect(config).await?);
        self.stats.handles_created.fetch_add(1, Ordering::Relaxed);
        Ok(handle)
    }

    // ==================== Lifecycle ====================

    /// Make sure a healthy handle exists and return it.
    ///
    /// A healthy handle is returned as is (the new settings are ignored); a
    /// missing or unhealthy one is created or replaced. Concurrent callers
    /// converge on a single new handle.
    pub async fn connect(&self, config: &DbConfig) -> SqlResult<Arc<C::Handle>> {
        if let Some(handle) = self.healthy_current() {
            return Ok(handle);
        }

        let mut settings = self.connect_lock.lock().await;
        if let Some(handle) = self.healthy_current() {
            return Ok(handle);
        }

        let handle = self.open(config).await.inspect_err(|e| {
            tracing::warn!(
                target: "salesql.connection",
                host = %config.host,
                database = %config.database,
                error = %e,
                "connect failed"
            );
        })?;
        *settings = Some(config.clone());

        if self.swap(Some(handle.clone())).is_some() {
            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                target: "salesql.connection",
                host = %config.host,
                database = %config.database,
                "replaced stale connection"
            );
        } else {
            tracing::info!(
                target: "salesql.connection",
                host = %config.host,
                port = config.port,
                database = %config.database,
                "connected"
            );
        }
        Ok(handle)
    }

    /// Replace `stale` using the settings of the last successful connect.
    ///
    /// If another caller already replaced it, that handle is returned.
    async fn reconnect(&self, stale: &Arc<C::Handle>) -> SqlResult<Arc<C::Handle>> {
        let settings = self.connect_lock.lock().await;
        let config = settings.as_ref().ok_or(SqlError::NotConnected)?;

        match self.current() {
            None => return Err(SqlError::NotConnected),
            Some(current) if !Arc::ptr_eq(&current, stale) && current.is_healthy() => {
                return Ok(current);
            }
            Some(_) => {}
        }

        let handle = self.open(config).await?;
        self.swap(Some(handle.clone()));
        self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "salesql.connection",
            host = %config.host,
            database = %config.database,
            "reconnected"
        );
        Ok(handle)
    }

    /// The current handle, or [`SqlError::NotConnected`].
    pub fn get_connection(&self) -> SqlResult<Arc<C::Handle>> {
        self.current().ok_or(SqlError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    /// Release the handle. Returns whether one was held.
    ///
    /// Callers still holding an `Arc` keep it alive until they drop it.
    pub async fn disconnect(&self) -> bool {
        let mut settings = self.connect_lock.lock().await;
        *settings = None;
        let released = self.swap(None).is_some();
        if released {
            tracing::info!(target: "salesql.connection", "disconnected");
        }
        released
    }

    // ==================== Execution ====================

    /// Run `sql` (with `:name` placeholders) against the shared handle.
    ///
    /// Transient failures are retried with backoff, reconnecting in between.
    /// When retries run out, or on a non-transient failure, the driver error
    /// is returned inside [`SqlError::QueryExecution`]. Placeholder errors and
    /// [`SqlError::NotConnected`] are returned unwrapped.
    pub async fn execute(&self, sql: &str, params: &Params) -> SqlResult<Vec<Record>> {
        let (positional, values) = placeholder::to_positional(sql, params)?;
        let max_attempts = self.retry.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let handle = self.get_connection()?;
            tracing::debug!(
                target: "salesql.sql",
                attempt,
                param_count = values.len(),
                sql = %truncate_sql(&positional),
                "execute"
            );

            let err = match handle.query(&positional, &values).await {
                Ok(rows) => return Ok(rows),
                Err(err) => err,
            };

            if !err.is_transient() || attempt >= max_attempts {
                tracing::warn!(
                    target: "salesql.sql",
                    attempt,
                    error = %err,
                    sql = %truncate_sql(&positional),
                    "query failed"
                );
                return Err(SqlError::execution(attempt, err));
            }

            let delay = self.retry.delay_for(attempt);
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                target: "salesql.connection",
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;

            match self.reconnect(&handle).await {
                Ok(_) => {}
                Err(SqlError::NotConnected) => return Err(SqlError::NotConnected),
                // The next attempt fails fast on the stale handle and retries again.
                Err(e) if e.is_transient() => {
                    tracing::warn!(target: "salesql.connection", error = %e, "reconnect failed");
                }
                Err(e) => return Err(SqlError::execution(attempt, e)),
            }
        }
    }

    /// Run a finished query.
    pub async fn execute_query(&self, query: &BuiltQuery) -> SqlResult<Vec<Record>> {
        self.execute(query.sql(), query.params()).await
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connected", &self.is_connected())
            .field("retry", &self.retry)
            .field("stats", &self.stats())
            .finish()
    }
}
