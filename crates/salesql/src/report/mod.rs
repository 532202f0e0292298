//! Reports: named, validated, re-runnable analyses over the sales data.
//!
//! A [`ReportFactory`] maps a tag (`"sales"`, `"product"`, ...) to a
//! [`ReportDescriptor`] holding the argument schema and a constructor.
//! Creating a report only validates arguments and prepares its query;
//! [`Report::generate`] runs it.
//!
//! ```ignore
//! use salesql::report::{ReportArgs, ReportFactory};
//!
//! let factory = ReportFactory::with_builtin_reports();
//! let report = factory.create(
//!     "sales",
//!     &ReportArgs::new()
//!         .with("start_date", "2024-01-01")
//!         .with("end_date", "2024-03-31"),
//! )?;
//! let output = report.generate(&db).await?;
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! ```

mod args;
mod builtin;
mod factory;

pub use args::ReportArgs;
pub use builtin::{
    CategoryReport, CustomerReport, EmployeeReport, PeriodReport, ProductReport, SalesReport,
};
pub use factory::{ReportCtor, ReportDescriptor, ReportFactory};

use crate::connection::{ConnectionManager, Connector};
use crate::error::SqlResult;
use crate::qb::BuiltQuery;
use crate::row::Record;
use crate::value::Value;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Anything that can run a built query and return decoded rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn fetch(&self, query: &BuiltQuery) -> SqlResult<Vec<Record>>;
}

#[async_trait]
impl<C: Connector> QueryExecutor for ConnectionManager<C> {
    async fn fetch(&self, query: &BuiltQuery) -> SqlResult<Vec<Record>> {
        self.execute_query(query).await
    }
}

/// A ready-to-run analysis.
#[async_trait]
pub trait Report: Send + Sync + fmt::Debug {
    /// Registry tag of this report.
    fn kind(&self) -> &'static str;

    /// The query `generate` will run. No I/O.
    fn query(&self) -> SqlResult<BuiltQuery>;

    /// Run the query against current data and shape the rows.
    ///
    /// Every call re-executes; nothing is cached.
    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput>;
}

/// Serializable result of [`Report::generate`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportOutput {
    pub kind: String,
    /// Report-level figures (totals, echo of the arguments).
    pub summary: BTreeMap<String, Value>,
    pub rows: Vec<Record>,
}

impl ReportOutput {
    pub fn new(kind: impl Into<String>, rows: Vec<Record>) -> Self {
        Self {
            kind: kind.into(),
            summary: BTreeMap::new(),
            rows,
        }
    }

    pub fn with_summary(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.summary.insert(key.into(), value.into());
        self
    }

    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }
}
