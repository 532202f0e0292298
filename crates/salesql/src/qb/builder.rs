//! Generic SELECT builder with named parameters.

use crate::error::{SqlError, SqlResult};
use crate::qb::param::{BuiltQuery, Params};
use crate::qb::placeholder;
use crate::value::Value;
use std::fmt::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct JoinClause {
    kind: JoinKind,
    table: String,
    on: String,
}

/// Fluent SELECT builder.
///
/// Fragments are kept as raw SQL strings; caller values only ever enter the
/// parameter bag and are referenced from fragments as `:name` placeholders.
/// Argument errors raised by fluent methods are recorded (the first one wins)
/// and returned by [`QueryBuilder::build`].
///
/// # Example
/// ```ignore
/// use salesql::{QueryBuilder, params};
///
/// let q = QueryBuilder::new()
///     .select(["ProductID", "COUNT(*) as total"])
///     .from_table("sales")
///     .and_where("SalesDate >= :start", params! { "start" => "2024-01-01" })
///     .group_by(["ProductID"])
///     .build()?;
/// assert_eq!(
///     q.sql(),
///     "SELECT ProductID, COUNT(*) as total FROM sales WHERE SalesDate >= :start GROUP BY ProductID"
/// );
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct QueryBuilder {
    /// SELECT columns (empty renders `*`)
    select_cols: Vec<String>,
    /// FROM table
    from_table: Option<String>,
    /// JOIN clauses, in call order
    joins: Vec<JoinClause>,
    /// WHERE fragments, ANDed
    where_clauses: Vec<String>,
    /// GROUP BY columns
    group_by: Vec<String>,
    /// HAVING fragments, ANDed
    having_clauses: Vec<String>,
    /// ORDER BY clauses
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    params: Params,
    /// First argument error
    build_error: Option<SqlError>,
}

impl Clone for QueryBuilder {
    fn clone(&self) -> Self {
        Self {
            select_cols: self.select_cols.clone(),
            from_table: self.from_table.clone(),
            joins: self.joins.clone(),
            where_clauses: self.where_clauses.clone(),
            group_by: self.group_by.clone(),
            having_clauses: self.having_clauses.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            params: self.params.clone(),
            build_error: self.build_error.as_ref().and_then(SqlError::try_clone),
        }
    }
}

impl QueryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, err: SqlError) {
        if self.build_error.is_none() {
            tracing::debug!(target: "salesql.builder", error = %err, "builder argument rejected");
            self.build_error = Some(err);
        }
    }

    pub(crate) fn bind_all<I, K, V>(&mut self, bindings: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        match self.params.merge(bindings) {
            Ok(()) => true,
            Err(e) => {
                self.record(e);
                false
            }
        }
    }

    // ==================== SELECT / FROM ====================

    /// Append projection columns (expressions such as `COUNT(*) as total` are fine).
    ///
    /// An empty column list records [`SqlError::EmptyProjection`].
    pub fn select<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.select_cols.len();
        self.select_cols.extend(cols.into_iter().map(Into::into));
        if self.select_cols.len() == before {
            self.record(SqlError::EmptyProjection);
        }
        self
    }

    /// Set the source table. A second call replaces the first.
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.from_table = Some(table.into());
        self
    }

    // ==================== JOIN ====================

    /// Append `INNER JOIN table ON on`. Joins keep call order and are never deduplicated.
    pub fn join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(JoinClause {
            kind: JoinKind::Inner,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    /// Append `LEFT JOIN table ON on`.
    pub fn left_join(mut self, table: impl Into<String>, on: impl Into<String>) -> Self {
        self.joins.push(JoinClause {
            kind: JoinKind::Left,
            table: table.into(),
            on: on.into(),
        });
        self
    }

    // ==================== WHERE / HAVING ====================

    /// Append a WHERE fragment (ANDed with earlier ones) and bind its parameters.
    ///
    /// If a binding conflicts with an existing one the fragment is not added
    /// and [`SqlError::AmbiguousParameter`] is recorded.
    pub fn and_where<I, K, V>(mut self, condition: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if self.bind_all(params) {
            self.where_clauses.push(condition.into());
        }
        self
    }

    /// Append a WHERE fragment that binds nothing.
    pub fn and_where_raw(mut self, condition: impl Into<String>) -> Self {
        self.where_clauses.push(condition.into());
        self
    }

    /// Append a HAVING fragment (ANDed) and bind its parameters.
    pub fn having<I, K, V>(mut self, condition: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        if self.bind_all(params) {
            self.having_clauses.push(condition.into());
        }
        self
    }

    /// Append a HAVING fragment that binds nothing.
    pub fn having_raw(mut self, condition: impl Into<String>) -> Self {
        self.having_clauses.push(condition.into());
        self
    }

    // ==================== Grouping, ordering, paging ====================

    /// Append GROUP BY columns.
    pub fn group_by<I, S>(mut self, cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(cols.into_iter().map(Into::into));
        self
    }

    /// Append ORDER BY clauses (`"total_revenue DESC"` etc).
    pub fn order_by<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(clauses.into_iter().map(Into::into));
        self
    }

    /// Set LIMIT. Negative values record [`SqlError::InvalidArgument`].
    ///
    /// The row count is rendered as an integer literal, not a placeholder;
    /// it is typed `i64`, so no caller text reaches the SQL.
    pub fn limit(mut self, n: i64) -> Self {
        if n < 0 {
            self.record(SqlError::invalid_argument(format!(
                "limit must be non-negative, got {n}"
            )));
        } else {
            self.limit = Some(n);
        }
        self
    }

    /// Set OFFSET. Negative values record [`SqlError::InvalidArgument`].
    /// Rendered as a literal, like [`QueryBuilder::limit`].
    pub fn offset(mut self, n: i64) -> Self {
        if n < 0 {
            self.record(SqlError::invalid_argument(format!(
                "offset must be non-negative, got {n}"
            )));
        } else {
            self.offset = Some(n);
        }
        self
    }

    // ==================== Introspection ====================

    /// Whether an identical join (any kind) was already added.
    pub fn has_join(&self, table: &str, on: &str) -> bool {
        self.joins.iter().any(|j| j.table == table && j.on == on)
    }

    /// Whether an identical WHERE fragment was already added.
    pub fn has_where(&self, condition: &str) -> bool {
        self.where_clauses.iter().any(|c| c == condition)
    }

    /// Whether an identical HAVING fragment was already added.
    pub fn has_having(&self, condition: &str) -> bool {
        self.having_clauses.iter().any(|c| c == condition)
    }

    pub fn has_select(&self, col: &str) -> bool {
        self.select_cols.iter().any(|c| c == col)
    }

    pub fn has_group_by(&self, col: &str) -> bool {
        self.group_by.iter().any(|c| c == col)
    }

    pub fn has_order_by(&self, clause: &str) -> bool {
        self.order_by.iter().any(|c| c == clause)
    }

    pub fn table(&self) -> Option<&str> {
        self.from_table.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// First recorded argument error, if any.
    pub fn build_error(&self) -> Option<&SqlError> {
        self.build_error.as_ref()
    }

    // ==================== Build ====================

    fn render(&self, from: &str) -> String {
        let mut sql = String::from("SELECT ");
        if self.select_cols.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.select_cols.join(", "));
        }

        let _ = write!(&mut sql, " FROM {from}");

        for j in &self.joins {
            let _ = write!(&mut sql, " {} {} ON {}", j.kind.keyword(), j.table, j.on);
        }

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having_clauses.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having_clauses.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            let _ = write!(&mut sql, " LIMIT {limit}");
        }

        if let Some(offset) = self.offset {
            let _ = write!(&mut sql, " OFFSET {offset}");
        }

        sql
    }

    /// Debug helper: render the SQL text without validating the builder.
    pub fn to_sql(&self) -> String {
        self.render(self.from_table.as_deref().unwrap_or("<missing>"))
    }

    /// Produce the immutable `(sql, params)` pair.
    ///
    /// Fails with the first recorded argument error, with
    /// [`SqlError::IncompleteQuery`] when no table was set, and when a
    /// placeholder lacks a binding (or a binding lacks a placeholder).
    /// Never mutates the builder; repeated calls return equal values.
    pub fn build(&self) -> SqlResult<BuiltQuery> {
        if let Some(err) = &self.build_error {
            return Err(err
                .try_clone()
                .unwrap_or_else(|| SqlError::invalid_argument(err.to_string())));
        }

        let Some(from) = self.from_table.as_deref() else {
            return Err(SqlError::incomplete("from_table() must be called before build()"));
        };

        let sql = self.render(from);
        placeholder::check_bindings(&sql, &self.params)?;
        Ok(BuiltQuery::new(sql, self.params.clone()))
    }
}
