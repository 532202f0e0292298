//! The single shared database handle.
//!
//! [`ConnectionManager`] owns at most one live handle per process (create it
//! once at start-up and pass `&ConnectionManager` around). Creation is
//! double-checked: readers look at the current handle without taking the
//! connect mutex, and only the create-or-replace path serializes.
//!
//! ```ignore
//! use salesql::{ConnectionManager, DbConfig, SalesQueryBuilder};
//!
//! let db = ConnectionManager::new();
//! db.connect(&DbConfig::from_env()?).await?;
//!
//! let q = SalesQueryBuilder::new().group_by_product().limit(5).build()?;
//! for row in db.execute_query(&q).await? {
//!     println!("{:?}", row.get("total_revenue"));
//! }
//! ```
//!
//! The transport sits behind [`Connector`] / [`DbHandle`]; [`PgConnector`] is
//! the tokio-postgres implementation.

mod manager;
mod postgres;
mod retry;

pub use manager::{ConnectionManager, ConnectionStats};
pub use postgres::{PgConnector, PgHandle};
pub use retry::RetryPolicy;

use crate::config::DbConfig;
use crate::error::SqlResult;
use crate::row::Record;
use crate::value::Value;
use std::future::Future;

/// A live link to the database.
pub trait DbHandle: Send + Sync + 'static {
    /// `false` once the link is known to be dropped or stale.
    fn is_healthy(&self) -> bool;

    /// Run one statement with `$n` placeholders and decode every row.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = SqlResult<Vec<Record>>> + Send;
}

/// Opens new handles.
pub trait Connector: Send + Sync + 'static {
    type Handle: DbHandle;

    fn connect(&self, config: &DbConfig) -> impl Future<Output = SqlResult<Self::Handle>> + Send;
}
