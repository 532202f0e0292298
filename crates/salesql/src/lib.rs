//! # salesql
//!
//! Parameter-safe query construction and reporting over a sales database.
//!
//! ## Features
//!
//! - **No interpolated values**: builders emit SQL with `:name` placeholders; values
//!   only travel in a parameter bag and are bound positionally at execution
//! - **Deferred errors**: fluent calls never fail midway; `build()` reports the first problem
//! - **Domain builder**: `SalesQueryBuilder` adds joins and filters idempotently
//! - **One shared handle**: `ConnectionManager` creates the database handle once,
//!   replaces it when stale, and retries transient failures with backoff
//! - **Report registry**: `ReportFactory` maps tags to validated, re-runnable reports
//!
//! ## Example
//!
//! ```ignore
//! use salesql::{ConnectionManager, DbConfig, ReportArgs, ReportFactory};
//!
//! let db = ConnectionManager::new();
//! db.connect(&DbConfig::load(None)?).await?;
//!
//! let report = ReportFactory::with_builtin_reports().create(
//!     "sales",
//!     &ReportArgs::new()
//!         .with("start_date", "2024-01-01")
//!         .with("end_date", "2024-03-31"),
//! )?;
//! let output = report.generate(&db).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod qb;
pub mod report;
pub mod row;
pub mod value;

pub use config::DbConfig;
pub use connection::{
    ConnectionManager, ConnectionStats, Connector, DbHandle, PgConnector, PgHandle, RetryPolicy,
};
pub use error::{SqlError, SqlResult};
pub use qb::{BuiltQuery, Granularity, Params, QueryBuilder, SalesQueryBuilder};
pub use report::{
    QueryExecutor, Report, ReportArgs, ReportDescriptor, ReportFactory, ReportOutput,
};
pub use row::Record;
pub use value::Value;
