//! Sales-specific builder: business filters over the `sales` table.

use crate::error::{SqlError, SqlResult};
use crate::qb::builder::QueryBuilder;
use crate::qb::param::{BuiltQuery, Params};
use crate::value::Value;
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

const SALES_TABLE: &str = "sales";
const DAY_FORMAT: &str = "%Y-%m-%d";

const PRODUCTS_JOIN: (&str, &str) = ("products p", "sales.ProductID = p.ProductID");
const CATEGORIES_JOIN: (&str, &str) = ("categories c", "p.CategoryID = c.CategoryID");
const EMPLOYEES_JOIN: (&str, &str) = ("employees e", "sales.SalesPersonID = e.EmployeeID");
const CUSTOMERS_JOIN: (&str, &str) = ("customers cu", "sales.CustomerID = cu.CustomerID");

const DATE_RANGE_FILTER: &str = "CAST(sales.SalesDate AS DATE) BETWEEN :start_date AND :end_date";
const TIMESTAMP_RANGE_FILTER: &str = "sales.SalesDate BETWEEN :start_date AND :end_date";
const CATEGORY_FILTER: &str = "p.CategoryID = :category_id";
const EMPLOYEE_FILTER: &str = "sales.SalesPersonID = :employee_id";
const CUSTOMER_FILTER: &str = "sales.CustomerID = :customer_id";
const MIN_PURCHASES_FILTER: &str = "COUNT(*) >= :min_purchases";

/// Bucket size for [`SalesQueryBuilder::group_by_period`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Month,
    Year,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Month => "month",
            Granularity::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = SqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            _ => Err(SqlError::UnsupportedGranularity(s.to_string())),
        }
    }
}

/// Query builder for sales analytics.
///
/// Wraps a [`QueryBuilder`] already targeting `sales`. Domain methods are
/// idempotent: the joins and filters they need are only added once, so
/// calling a method twice with the same arguments leaves the query unchanged.
///
/// ```ignore
/// let q = SalesQueryBuilder::new()
///     .with_date_range("2024-01-01", "2024-03-31")
///     .with_product_category(5)
///     .group_by_product()
///     .build()?;
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct SalesQueryBuilder {
    inner: QueryBuilder,
}

/// A range bound with day precision: a date, or `YYYY-MM-DD` text.
fn day_bound(v: &Value) -> Option<NaiveDate> {
    match v {
        Value::Date(d) => Some(*d),
        Value::Text(s) => NaiveDate::parse_from_str(s.trim(), DAY_FORMAT).ok(),
        _ => None,
    }
}

impl Default for SalesQueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SalesQueryBuilder {
    pub fn new() -> Self {
        Self {
            inner: QueryBuilder::new().from_table(SALES_TABLE),
        }
    }

    // ==================== Idempotent composition helpers ====================

    fn ensure_join(mut self, (table, on): (&str, &str)) -> Self {
        if !self.inner.has_join(table, on) {
            self.inner = self.inner.join(table, on);
        }
        self
    }

    fn ensure_select(mut self, cols: &[&str]) -> Self {
        let missing: Vec<&str> = cols
            .iter()
            .copied()
            .filter(|c| !self.inner.has_select(c))
            .collect();
        if !missing.is_empty() {
            self.inner = self.inner.select(missing);
        }
        self
    }

    fn ensure_group_by(mut self, cols: &[&str]) -> Self {
        let missing: Vec<&str> = cols
            .iter()
            .copied()
            .filter(|c| !self.inner.has_group_by(c))
            .collect();
        self.inner = self.inner.group_by(missing);
        self
    }

    /// Add `condition` once; later calls only re-check their bindings.
    fn filter(mut self, condition: &str, params: Vec<(&str, Value)>) -> Self {
        if self.inner.has_where(condition) {
            self.inner.bind_all(params);
        } else {
            self.inner = self.inner.and_where(condition, params);
        }
        self
    }

    /// HAVING counterpart of [`SalesQueryBuilder::filter`].
    fn filter_groups(mut self, condition: &str, params: Vec<(&str, Value)>) -> Self {
        if self.inner.has_having(condition) {
            self.inner.bind_all(params);
        } else {
            self.inner = self.inner.having(condition, params);
        }
        self
    }

    fn reject(mut self, err: SqlError) -> Self {
        self.inner.record(err);
        self
    }

    // ==================== Filters ====================

    /// Restrict to sales between `start` and `end` (inclusive).
    ///
    /// Bounds may be dates, timestamps or ISO-8601 text. When both are whole
    /// days the sale timestamp is compared by calendar date, so every sale on
    /// the `end` day is included; otherwise the timestamps are compared as
    /// given. `start > end` records [`SqlError::InvalidRange`].
    pub fn with_date_range(self, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        let (start, end) = (start.into(), end.into());
        match start.compare(&end) {
            Some(Ordering::Greater) => self.reject(SqlError::InvalidRange { start, end }),
            None => {
                let msg = format!(
                    "date range bounds are not comparable ({} vs {})",
                    start.kind(),
                    end.kind()
                );
                self.reject(SqlError::InvalidArgument(msg))
            }
            Some(_) => match (day_bound(&start), day_bound(&end)) {
                (Some(first), Some(last)) => self.filter(
                    DATE_RANGE_FILTER,
                    vec![("start_date", first.into()), ("end_date", last.into())],
                ),
                _ => self.filter(
                    TIMESTAMP_RANGE_FILTER,
                    vec![("start_date", start), ("end_date", end)],
                ),
            },
        }
    }

    /// Restrict to products of one category (joins `products` once).
    pub fn with_product_category(self, category_id: impl Into<Value>) -> Self {
        self.ensure_join(PRODUCTS_JOIN)
            .filter(CATEGORY_FILTER, vec![("category_id", category_id.into())])
    }

    /// Restrict to sales made by one employee.
    pub fn with_employee(self, employee_id: impl Into<Value>) -> Self {
        self.filter(EMPLOYEE_FILTER, vec![("employee_id", employee_id.into())])
    }

    /// Restrict to purchases of one customer.
    pub fn with_customer(self, customer_id: impl Into<Value>) -> Self {
        self.filter(CUSTOMER_FILTER, vec![("customer_id", customer_id.into())])
    }

    // ==================== Groupings ====================

    /// Per-product totals.
    pub fn group_by_product(self) -> Self {
        self.ensure_join(PRODUCTS_JOIN)
            .ensure_select(&[
                "p.ProductID",
                "p.ProductName",
                "COUNT(*) AS total_sales",
                "SUM(sales.Quantity) AS total_quantity",
                "SUM(sales.TotalPrice) AS total_revenue",
            ])
            .ensure_group_by(&["p.ProductID", "p.ProductName"])
    }

    /// Per-employee totals.
    pub fn group_by_employee(self) -> Self {
        self.ensure_join(EMPLOYEES_JOIN)
            .ensure_select(&[
                "e.EmployeeID",
                "e.FirstName",
                "e.LastName",
                "COUNT(*) AS total_sales",
                "SUM(sales.TotalPrice) AS total_revenue",
                "AVG(sales.TotalPrice) AS avg_sale_value",
            ])
            .ensure_group_by(&["e.EmployeeID", "e.FirstName", "e.LastName"])
    }

    /// Per-category totals (joins `products` and `categories`).
    pub fn group_by_category(self) -> Self {
        self.ensure_join(PRODUCTS_JOIN)
            .ensure_join(CATEGORIES_JOIN)
            .ensure_select(&[
                "c.CategoryID",
                "c.CategoryName",
                "COUNT(*) AS total_sales",
                "SUM(sales.Quantity) AS total_quantity",
                "SUM(sales.TotalPrice) AS total_revenue",
                "AVG(sales.TotalPrice) AS avg_sale_value",
            ])
            .ensure_group_by(&["c.CategoryID", "c.CategoryName"])
    }

    /// Per-customer totals with first and last purchase dates.
    pub fn group_by_customer(self) -> Self {
        self.ensure_join(CUSTOMERS_JOIN)
            .ensure_select(&[
                "cu.CustomerID",
                "cu.FirstName",
                "cu.LastName",
                "COUNT(*) AS total_purchases",
                "SUM(sales.TotalPrice) AS total_spent",
                "AVG(sales.TotalPrice) AS avg_purchase_value",
                "MIN(sales.SalesDate) AS first_purchase",
                "MAX(sales.SalesDate) AS last_purchase",
            ])
            .ensure_group_by(&["cu.CustomerID", "cu.FirstName", "cu.LastName"])
    }

    /// Revenue per time bucket; `granularity` is `day`, `month` or `year`.
    ///
    /// Anything else records [`SqlError::UnsupportedGranularity`].
    pub fn group_by_period(self, granularity: &str) -> Self {
        match granularity.parse::<Granularity>() {
            Ok(g) => self.group_by_granularity(g),
            Err(e) => self.reject(e),
        }
    }

    /// Typed form of [`SalesQueryBuilder::group_by_period`].
    pub fn group_by_granularity(mut self, granularity: Granularity) -> Self {
        // The unit is one of three fixed keywords, never caller text.
        let bucket = format!("DATE_TRUNC('{}', sales.SalesDate)", granularity.as_str());
        let projection = format!("{bucket} AS period");
        self = self
            .ensure_select(&[
                projection.as_str(),
                "COUNT(*) AS total_sales",
                "SUM(sales.TotalPrice) AS total_revenue",
            ])
            .ensure_group_by(&[bucket.as_str()]);
        if !self.inner.has_order_by("period") {
            self.inner = self.inner.order_by(["period"]);
        }
        self
    }

    /// Keep only groups with at least `n` sales (`HAVING COUNT(*) >= :min_purchases`).
    pub fn min_purchases(self, n: i64) -> Self {
        if n < 0 {
            return self.reject(SqlError::invalid_argument(format!(
                "min_purchases must be non-negative, got {n}"
            )));
        }
        self.filter_groups(MIN_PURCHASES_FILTER, vec![("min_purchases", n.into())])
    }

    // ==================== Passthrough ====================

    pub fn order_by<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner = self.inner.order_by(clauses);
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.inner = self.inner.limit(n);
        self
    }

    pub fn params(&self) -> &Params {
        self.inner.params()
    }

    pub fn inner(&self) -> &QueryBuilder {
        &self.inner
    }

    /// Drop down to the generic builder for clauses the domain vocabulary lacks.
    pub fn into_inner(self) -> QueryBuilder {
        self.inner
    }

    pub fn to_sql(&self) -> String {
        self.inner.to_sql()
    }

    pub fn build(&self) -> SqlResult<BuiltQuery> {
        self.inner.build()
    }
}
