//! Query builders for salesql.
//!
//! Two layers share one representation:
//!
//! - [`QueryBuilder`]: generic SELECT builder. Fragments are raw SQL with
//!   `:name` placeholders; values only travel in the [`Params`] bag.
//! - [`SalesQueryBuilder`]: business vocabulary (date ranges, categories,
//!   groupings) over the `sales` table, built on top of `QueryBuilder`.
//!
//! Both produce an immutable [`BuiltQuery`] whose placeholders are rewritten to
//! `$1, $2, ...` only when it is executed.
//!
//! # Usage
//!
//! ```ignore
//! use salesql::{params, qb::{QueryBuilder, SalesQueryBuilder}};
//!
//! let q = QueryBuilder::new()
//!     .select(["ProductID", "COUNT(*) as total"])
//!     .from_table("sales")
//!     .and_where("SalesDate >= :start", params! { "start" => "2024-01-01" })
//!     .group_by(["ProductID"])
//!     .build()?;
//!
//! let top = SalesQueryBuilder::new()
//!     .with_date_range("2024-01-01", "2024-03-31")
//!     .group_by_product()
//!     .order_by(["total_revenue DESC"])
//!     .limit(10)
//!     .build()?;
//! ```

mod builder;
mod param;
pub(crate) mod placeholder;
mod sales;

pub use builder::QueryBuilder;
pub use param::{BuiltQuery, Params};
pub use sales::{Granularity, SalesQueryBuilder};

/// Build a list of named bindings for [`QueryBuilder::and_where`] and
/// [`QueryBuilder::having`].
///
/// ```ignore
/// let bindings = salesql::params! { "start" => "2024-01-01", "limit" => 10 };
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((
            ::std::string::String::from($name),
            $crate::Value::from($value),
        )),+]
    };
}

#[cfg(test)]
mod tests;
