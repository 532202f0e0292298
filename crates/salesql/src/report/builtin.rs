//! The built-in report types.

use super::args::ReportArgs;
use super::factory::ReportDescriptor;
use super::{QueryExecutor, Report, ReportOutput};
use crate::error::{SqlError, SqlResult};
use crate::qb::{BuiltQuery, Granularity, SalesQueryBuilder};
use crate::row::Record;
use crate::value::Value;
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};

const DEFAULT_PRODUCT_LIMIT: i64 = 10;
const DEFAULT_MIN_PURCHASES: i64 = 1;

pub(super) fn descriptors() -> [ReportDescriptor; 6] {
    [
        ReportDescriptor {
            tag: SalesReport::TAG,
            description: "Sales totals and per-product breakdown for a date range",
            required: &["start_date", "end_date"],
            optional: &["category_id"],
            build: |args| Ok(Box::new(SalesReport::from_args(args)?)),
        },
        ReportDescriptor {
            tag: ProductReport::TAG,
            description: "Top products by revenue",
            required: &[],
            optional: &["start_date", "end_date", "category_id", "limit"],
            build: |args| Ok(Box::new(ProductReport::from_args(args)?)),
        },
        ReportDescriptor {
            tag: EmployeeReport::TAG,
            description: "Sales performance per employee",
            required: &[],
            optional: &["start_date", "end_date"],
            build: |args| Ok(Box::new(EmployeeReport::from_args(args)?)),
        },
        ReportDescriptor {
            tag: CategoryReport::TAG,
            description: "Revenue per product category",
            required: &[],
            optional: &["start_date", "end_date"],
            build: |args| Ok(Box::new(CategoryReport::from_args(args)?)),
        },
        ReportDescriptor {
            tag: CustomerReport::TAG,
            description: "Customer purchase totals and first/last purchase",
            required: &[],
            optional: &["min_purchases"],
            build: |args| Ok(Box::new(CustomerReport::from_args(args)?)),
        },
        ReportDescriptor {
            tag: PeriodReport::TAG,
            description: "Revenue per day, month or year",
            required: &["granularity"],
            optional: &["start_date", "end_date"],
            build: |args| Ok(Box::new(PeriodReport::from_args(args)?)),
        },
    ]
}

// ==================== Shared helpers ====================

/// Optional `start_date`/`end_date` pair: both or neither.
fn date_range(args: &ReportArgs) -> SqlResult<Option<(Value, Value)>> {
    match (args.date("start_date")?, args.date("end_date")?) {
        (Some(start), Some(end)) => Ok(Some((start, end))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(SqlError::MissingArgument(vec!["end_date".into()])),
        (None, Some(_)) => Err(SqlError::MissingArgument(vec!["start_date".into()])),
    }
}

fn apply_range(qb: SalesQueryBuilder, range: &Option<(Value, Value)>) -> SalesQueryBuilder {
    match range {
        Some((start, end)) => qb.with_date_range(start.clone(), end.clone()),
        None => qb,
    }
}

/// Build once so argument errors surface from `create`, before any I/O.
fn validated(qb: SalesQueryBuilder) -> SqlResult<SalesQueryBuilder> {
    qb.build()?;
    Ok(qb)
}

fn sum_f64(rows: &[Record], column: &str) -> f64 {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(Value::as_f64))
        .sum()
}

fn sum_i64(rows: &[Record], column: &str) -> i64 {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(Value::as_i64))
        .sum()
}

/// Row with the largest numeric `column`.
fn top_row<'a>(rows: &'a [Record], column: &str) -> Option<&'a Record> {
    rows.iter()
        .filter_map(|r| r.get(column).and_then(Value::as_f64).map(|v| (v, r)))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, r)| r)
}

fn full_name(row: &Record) -> Option<String> {
    let first = row.get("firstname").or_else(|| row.get("FirstName"))?.as_str()?;
    let last = row.get("lastname").or_else(|| row.get("LastName"))?.as_str()?;
    Some(format!("{first} {last}"))
}

/// Add `days_since_last_purchase` and `purchase_frequency_days` to a
/// customer row. Rows missing the dates are left as they are.
pub(super) fn add_customer_metrics(row: &mut Record, now: NaiveDateTime) {
    let first = row.get("first_purchase").and_then(Value::as_datetime);
    let Some(last) = row.get("last_purchase").and_then(Value::as_datetime) else {
        return;
    };
    row.insert("days_since_last_purchase", (now - last).num_days());

    let purchases = row.get("total_purchases").and_then(Value::as_i64);
    if let (Some(first), Some(n)) = (first, purchases.filter(|n| *n > 0)) {
        row.insert(
            "purchase_frequency_days",
            (last - first).num_days() as f64 / n as f64,
        );
    }
}

fn with_range_summary(out: ReportOutput, range: &Option<(Value, Value)>) -> ReportOutput {
    match range {
        Some((start, end)) => out
            .with_summary("start_date", start.clone())
            .with_summary("end_date", end.clone()),
        None => out,
    }
}

async fn run(
    kind: &'static str,
    qb: &SalesQueryBuilder,
    db: &dyn QueryExecutor,
) -> SqlResult<Vec<Record>> {
    let query = qb.build()?;
    tracing::debug!(target: "salesql.report", kind, "generating report");
    db.fetch(&query).await
}

// ==================== sales ====================

/// Totals for a date range with a per-product breakdown.
#[derive(Debug, Clone)]
pub struct SalesReport {
    start: Value,
    end: Value,
    category_id: Option<i64>,
    qb: SalesQueryBuilder,
}

impl SalesReport {
    pub const TAG: &'static str = "sales";

    pub fn new(
        start: impl Into<Value>,
        end: impl Into<Value>,
        category_id: Option<i64>,
    ) -> SqlResult<Self> {
        let (start, end) = (start.into(), end.into());
        let mut qb = SalesQueryBuilder::new().with_date_range(start.clone(), end.clone());
        if let Some(id) = category_id {
            qb = qb.with_product_category(id);
        }
        let qb = validated(qb.group_by_product().order_by(["total_revenue DESC"]))?;
        Ok(Self {
            start,
            end,
            category_id,
            qb,
        })
    }

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let start = args
            .date("start_date")?
            .ok_or_else(|| SqlError::MissingArgument(vec!["start_date".into()]))?;
        let end = args
            .date("end_date")?
            .ok_or_else(|| SqlError::MissingArgument(vec!["end_date".into()]))?;
        Self::new(start, end, args.int("category_id")?)
    }
}

#[async_trait]
impl Report for SalesReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let rows = run(Self::TAG, &self.qb, db).await?;
        let mut out = ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("start_date", self.start.clone())
            .with_summary("end_date", self.end.clone())
            .with_summary("total_sales", sum_i64(&rows, "total_sales"))
            .with_summary("total_quantity", sum_f64(&rows, "total_quantity"))
            .with_summary("total_revenue", sum_f64(&rows, "total_revenue"))
            .with_summary("unique_products", rows.len() as i64);
        if let Some(id) = self.category_id {
            out = out.with_summary("category_id", id);
        }
        Ok(out.with_rows(rows))
    }
}

// ==================== product ====================

/// Top products by revenue.
#[derive(Debug, Clone)]
pub struct ProductReport {
    limit: i64,
    qb: SalesQueryBuilder,
}

impl ProductReport {
    pub const TAG: &'static str = "product";

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let limit = args.int("limit")?.unwrap_or(DEFAULT_PRODUCT_LIMIT);
        if limit <= 0 {
            return Err(SqlError::invalid_argument(format!(
                "'limit' must be positive, got {limit}"
            )));
        }
        let range = date_range(args)?;
        let mut qb = apply_range(SalesQueryBuilder::new(), &range);
        if let Some(id) = args.int("category_id")? {
            qb = qb.with_product_category(id);
        }
        let qb = validated(
            qb.group_by_product()
                .order_by(["total_revenue DESC"])
                .limit(limit),
        )?;
        Ok(Self { limit, qb })
    }
}

#[async_trait]
impl Report for ProductReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let rows = run(Self::TAG, &self.qb, db).await?;
        Ok(ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("limit", self.limit)
            .with_summary("total_products", rows.len() as i64)
            .with_summary("total_revenue", sum_f64(&rows, "total_revenue"))
            .with_rows(rows))
    }
}

// ==================== employee ====================

/// Sales count, revenue and average sale value per employee.
#[derive(Debug, Clone)]
pub struct EmployeeReport {
    range: Option<(Value, Value)>,
    qb: SalesQueryBuilder,
}

impl EmployeeReport {
    pub const TAG: &'static str = "employee";

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let range = date_range(args)?;
        let qb = validated(
            apply_range(SalesQueryBuilder::new(), &range)
                .group_by_employee()
                .order_by(["total_revenue DESC"]),
        )?;
        Ok(Self { range, qb })
    }
}

#[async_trait]
impl Report for EmployeeReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let mut rows = run(Self::TAG, &self.qb, db).await?;
        for row in &mut rows {
            if let Some(name) = full_name(row) {
                row.insert("employee_name", name);
            }
        }
        let top = top_row(&rows, "total_revenue").and_then(full_name);
        let mut out = ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("total_employees", rows.len() as i64)
            .with_summary("total_revenue", sum_f64(&rows, "total_revenue"))
            .with_summary("top_employee", top);
        out = with_range_summary(out, &self.range);
        Ok(out.with_rows(rows))
    }
}

// ==================== category ====================

/// Revenue per product category.
#[derive(Debug, Clone)]
pub struct CategoryReport {
    range: Option<(Value, Value)>,
    qb: SalesQueryBuilder,
}

impl CategoryReport {
    pub const TAG: &'static str = "category";

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let range = date_range(args)?;
        let qb = validated(
            apply_range(SalesQueryBuilder::new(), &range)
                .group_by_category()
                .order_by(["total_revenue DESC"]),
        )?;
        Ok(Self { range, qb })
    }
}

#[async_trait]
impl Report for CategoryReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let rows = run(Self::TAG, &self.qb, db).await?;
        let top = top_row(&rows, "total_revenue")
            .and_then(|r| r.get("categoryname").or_else(|| r.get("CategoryName")))
            .cloned()
            .unwrap_or(Value::Null);
        let out = ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("total_categories", rows.len() as i64)
            .with_summary("total_revenue", sum_f64(&rows, "total_revenue"))
            .with_summary("top_category", top);
        Ok(with_range_summary(out, &self.range).with_rows(rows))
    }
}

// ==================== customer ====================

/// Per-customer spend for customers with at least `min_purchases` purchases,
/// with recency and purchase frequency derived from the first/last purchase.
#[derive(Debug, Clone)]
pub struct CustomerReport {
    min_purchases: i64,
    qb: SalesQueryBuilder,
}

impl CustomerReport {
    pub const TAG: &'static str = "customer";

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let min_purchases = args.int("min_purchases")?.unwrap_or(DEFAULT_MIN_PURCHASES);
        if min_purchases < 1 {
            return Err(SqlError::invalid_argument(format!(
                "'min_purchases' must be at least 1, got {min_purchases}"
            )));
        }
        let qb = validated(
            SalesQueryBuilder::new()
                .group_by_customer()
                .min_purchases(min_purchases)
                .order_by(["total_spent DESC"]),
        )?;
        Ok(Self { min_purchases, qb })
    }
}

#[async_trait]
impl Report for CustomerReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let mut rows = run(Self::TAG, &self.qb, db).await?;
        let now = Local::now().naive_local();
        for row in &mut rows {
            add_customer_metrics(row, now);
        }
        Ok(ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("min_purchases", self.min_purchases)
            .with_summary("total_customers", rows.len() as i64)
            .with_summary("total_spent", sum_f64(&rows, "total_spent"))
            .with_rows(rows))
    }
}

// ==================== period ====================

/// Revenue per time bucket.
#[derive(Debug, Clone)]
pub struct PeriodReport {
    granularity: Granularity,
    range: Option<(Value, Value)>,
    qb: SalesQueryBuilder,
}

impl PeriodReport {
    pub const TAG: &'static str = "period";

    fn from_args(args: &ReportArgs) -> SqlResult<Self> {
        let granularity: Granularity = args
            .text("granularity")?
            .ok_or_else(|| SqlError::MissingArgument(vec!["granularity".into()]))?
            .parse()?;
        let range = date_range(args)?;
        let qb = validated(
            apply_range(SalesQueryBuilder::new(), &range).group_by_granularity(granularity),
        )?;
        Ok(Self {
            granularity,
            range,
            qb,
        })
    }
}

#[async_trait]
impl Report for PeriodReport {
    fn kind(&self) -> &'static str {
        Self::TAG
    }

    fn query(&self) -> SqlResult<BuiltQuery> {
        self.qb.build()
    }

    async fn generate(&self, db: &dyn QueryExecutor) -> SqlResult<ReportOutput> {
        let rows = run(Self::TAG, &self.qb, db).await?;
        let best = top_row(&rows, "total_revenue")
            .and_then(|r| r.get("period"))
            .cloned()
            .unwrap_or(Value::Null);
        let out = ReportOutput::new(Self::TAG, Vec::new())
            .with_summary("granularity", self.granularity.as_str())
            .with_summary("periods", rows.len() as i64)
            .with_summary("total_revenue", sum_f64(&rows, "total_revenue"))
            .with_summary("best_period", best);
        Ok(with_range_summary(out, &self.range).with_rows(rows))
    }
}
