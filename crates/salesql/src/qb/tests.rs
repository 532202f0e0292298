//! Integration tests for the qb module.

use crate::error::SqlError;
use crate::params;
use crate::qb::{Granularity, QueryBuilder, SalesQueryBuilder};
use crate::value::Value;
use chrono::NaiveDate;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_select_basic_scenario() {
    let q = QueryBuilder::new()
        .select(["ProductID", "COUNT(*) as total"])
        .from_table("sales")
        .and_where("SalesDate >= :start", params! { "start" => "2024-01-01" })
        .group_by(["ProductID"])
        .build()
        .unwrap();

    assert_eq!(
        q.sql(),
        "SELECT ProductID, COUNT(*) as total FROM sales WHERE SalesDate >= :start GROUP BY ProductID"
    );
    assert_eq!(q.params().len(), 1);
    assert_eq!(q.params().get("start"), Some(&Value::from("2024-01-01")));
}

#[test]
fn test_select_star_when_no_columns() {
    let q = QueryBuilder::new().from_table("sales").build().unwrap();
    assert_eq!(q.sql(), "SELECT * FROM sales");
    assert!(q.params().is_empty());
}

#[test]
fn test_canonical_clause_order() {
    // Called in scrambled order on purpose.
    let q = QueryBuilder::new()
        .limit(5)
        .order_by(["total DESC"])
        .having("COUNT(*) > :n", params! { "n" => 2 })
        .group_by(["c.CategoryName"])
        .and_where_raw("sales.Quantity > 0")
        .join("products p", "sales.ProductID = p.ProductID")
        .from_table("sales")
        .select(["c.CategoryName", "COUNT(*) AS total"])
        .left_join("categories c", "p.CategoryID = c.CategoryID")
        .offset(10)
        .build()
        .unwrap();

    assert_eq!(
        q.sql(),
        "SELECT c.CategoryName, COUNT(*) AS total FROM sales \
         INNER JOIN products p ON sales.ProductID = p.ProductID \
         LEFT JOIN categories c ON p.CategoryID = c.CategoryID \
         WHERE sales.Quantity > 0 GROUP BY c.CategoryName HAVING COUNT(*) > :n \
         ORDER BY total DESC LIMIT 5 OFFSET 10"
    );
}

#[test]
fn test_where_fragments_are_anded() {
    let q = QueryBuilder::new()
        .from_table("sales")
        .and_where("a = :a", params! { "a" => 1 })
        .and_where("b = :b", params! { "b" => 2 })
        .build()
        .unwrap();
    assert_eq!(q.sql(), "SELECT * FROM sales WHERE a = :a AND b = :b");
}

#[test]
fn test_from_table_last_write_wins() {
    let q = QueryBuilder::new()
        .from_table("products")
        .from_table("sales")
        .build()
        .unwrap();
    assert_eq!(q.sql(), "SELECT * FROM sales");
}

#[test]
fn test_missing_from_is_incomplete() {
    let err = QueryBuilder::new().select(["a"]).build().unwrap_err();
    assert!(matches!(err, SqlError::IncompleteQuery(_)));
}

#[test]
fn test_empty_select_is_rejected() {
    let err = QueryBuilder::new()
        .select(Vec::<String>::new())
        .from_table("sales")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::EmptyProjection));
}

#[test]
fn test_negative_limit_is_rejected() {
    let err = QueryBuilder::new()
        .from_table("sales")
        .limit(-1)
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidArgument(_)));
}

#[test]
fn test_first_error_wins() {
    let err = QueryBuilder::new()
        .from_table("sales")
        .offset(-3)
        .select(Vec::<String>::new())
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("offset"));
}

#[test]
fn test_unbound_placeholder_fails_build() {
    let err = QueryBuilder::new()
        .from_table("sales")
        .and_where_raw("CustomerID = :customer")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::UnboundParameter(ref n) if n == "customer"));
}

#[test]
fn test_unused_binding_fails_build() {
    let err = QueryBuilder::new()
        .from_table("sales")
        .and_where("Quantity > 0", params! { "ghost" => 1 })
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::UnusedParameter(ref n) if n == "ghost"));
}

#[test]
fn test_conflicting_rebind_is_ambiguous() {
    let qb = QueryBuilder::new()
        .from_table("sales")
        .and_where("a = :x", params! { "x" => 1 })
        .and_where("b = :x", params! { "x" => 2 });
    assert!(matches!(
        qb.build().unwrap_err(),
        SqlError::AmbiguousParameter { ref name, .. } if name == "x"
    ));
    // The conflicting fragment was never added.
    assert!(!qb.has_where("b = :x"));
}

#[test]
fn test_equal_rebind_shares_binding() {
    let q = QueryBuilder::new()
        .from_table("sales")
        .and_where("a = :x", params! { "x" => 1 })
        .and_where("b = :x", params! { "x" => 1 })
        .build()
        .unwrap();
    assert_eq!(q.params().len(), 1);
    let (sql, values) = q.to_positional().unwrap();
    assert_eq!(sql, "SELECT * FROM sales WHERE a = $1 AND b = $1");
    assert_eq!(values, vec![Value::Int(1)]);
}

#[test]
fn test_values_never_reach_sql_text() {
    let hostile = "x'; DROP TABLE sales; --";
    let q = QueryBuilder::new()
        .from_table("customers")
        .and_where("LastName = :name", params! { "name" => hostile })
        .build()
        .unwrap();
    assert!(!q.sql().contains(hostile));
    assert!(!q.sql().contains("DROP"));
    assert_eq!(q.params().get("name"), Some(&Value::from(hostile)));

    let (positional, values) = q.to_positional().unwrap();
    assert_eq!(positional, "SELECT * FROM customers WHERE LastName = $1");
    assert_eq!(values, vec![Value::from(hostile)]);
}

#[test]
fn test_build_is_idempotent_and_non_mutating() {
    let qb = QueryBuilder::new()
        .from_table("sales")
        .and_where("ProductID = :p", params! { "p" => 7 });

    let first = qb.build().unwrap();
    let second = qb.build().unwrap();
    assert_eq!(first, second);

    let extended = qb.clone().limit(3).build().unwrap();
    assert_eq!(extended.sql(), "SELECT * FROM sales WHERE ProductID = :p LIMIT 3");
    assert_eq!(first.sql(), "SELECT * FROM sales WHERE ProductID = :p");
    assert_eq!(qb.build().unwrap(), first);
}

#[test]
fn test_generic_join_is_not_deduplicated() {
    let q = QueryBuilder::new()
        .from_table("sales")
        .join("products p", "sales.ProductID = p.ProductID")
        .join("products p", "sales.ProductID = p.ProductID")
        .to_sql();
    assert_eq!(q.matches("INNER JOIN products p").count(), 2);
}

#[test]
fn test_params_macro_accepts_mixed_values() {
    let bindings = params! { "a" => 1, "b" => "two", "c" => 3.5, "d" => true };
    assert_eq!(bindings.len(), 4);
    assert_eq!(bindings[1], ("b".to_string(), Value::from("two")));
    assert!(params! {}.is_empty());
}

// ==================== SalesQueryBuilder ====================

const PRODUCT_SCENARIO_SQL: &str = "SELECT p.ProductID, p.ProductName, COUNT(*) AS total_sales, \
     SUM(sales.Quantity) AS total_quantity, SUM(sales.TotalPrice) AS total_revenue \
     FROM sales INNER JOIN products p ON sales.ProductID = p.ProductID \
     WHERE CAST(sales.SalesDate AS DATE) BETWEEN :start_date AND :end_date \
     AND p.CategoryID = :category_id \
     GROUP BY p.ProductID, p.ProductName";

#[test]
fn test_sales_product_scenario() {
    let q = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-03-31")
        .with_product_category(5)
        .group_by_product()
        .build()
        .unwrap();

    assert_eq!(q.sql(), PRODUCT_SCENARIO_SQL);
    assert_eq!(q.params().get("start_date"), Some(&Value::Date(ymd(2024, 1, 1))));
    assert_eq!(q.params().get("end_date"), Some(&Value::Date(ymd(2024, 3, 31))));
    assert_eq!(q.params().get("category_id"), Some(&Value::Int(5)));
}

#[test]
fn test_sales_category_join_added_once() {
    let q = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-03-31")
        .with_product_category(5)
        .with_product_category(5)
        .group_by_product()
        .build()
        .unwrap();

    assert_eq!(q.sql(), PRODUCT_SCENARIO_SQL);
    assert_eq!(q.sql().matches("JOIN products p").count(), 1);
    assert_eq!(q.sql().matches(":category_id").count(), 1);
}

#[test]
fn test_sales_category_conflict_is_ambiguous() {
    let err = SalesQueryBuilder::new()
        .with_product_category(5)
        .with_product_category(6)
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::AmbiguousParameter { ref name, .. } if name == "category_id"));
}

#[test]
fn test_sales_reversed_range_is_rejected() {
    let err = SalesQueryBuilder::new()
        .with_date_range("2024-03-31", "2024-01-01")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidRange { .. }));
}

#[test]
fn test_sales_single_day_range_is_allowed() {
    let q = SalesQueryBuilder::new()
        .with_date_range("2024-02-29", "2024-02-29")
        .build()
        .unwrap();
    assert!(q
        .sql()
        .ends_with("WHERE CAST(sales.SalesDate AS DATE) BETWEEN :start_date AND :end_date"));
}

#[test]
fn test_sales_day_range_includes_the_whole_end_day() {
    let q = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-03-31")
        .build()
        .unwrap();
    // Compared by calendar date: a sale at 2024-03-31 10:30 is inside.
    assert!(q.sql().contains("CAST(sales.SalesDate AS DATE) BETWEEN"));
    assert!(!q.sql().contains("WHERE sales.SalesDate BETWEEN"));
    assert_eq!(q.params().get("end_date"), Some(&Value::Date(ymd(2024, 3, 31))));
}

#[test]
fn test_sales_timestamp_range_compares_timestamps() {
    let start = ymd(2024, 3, 31).and_hms_opt(8, 0, 0).unwrap();
    let end = ymd(2024, 3, 31).and_hms_opt(18, 0, 0).unwrap();
    let q = SalesQueryBuilder::new()
        .with_date_range(start, end)
        .build()
        .unwrap();
    assert!(q
        .sql()
        .ends_with("WHERE sales.SalesDate BETWEEN :start_date AND :end_date"));
    assert_eq!(q.params().get("end_date"), Some(&Value::Timestamp(end)));
}

#[test]
fn test_sales_same_day_range_twice_is_unchanged() {
    let once = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-03-31")
        .build()
        .unwrap();
    let twice = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-03-31")
        .with_date_range(ymd(2024, 1, 1), ymd(2024, 3, 31))
        .build()
        .unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_sales_range_accepts_chrono_dates() {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let end = chrono::NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    let q = SalesQueryBuilder::new().with_date_range(start, end).build().unwrap();
    assert_eq!(q.params().get("start_date"), Some(&Value::Date(start)));
}

#[test]
fn test_sales_range_with_incomparable_bounds() {
    let err = SalesQueryBuilder::new()
        .with_date_range(1, "2024-01-01")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::InvalidArgument(_)));
}

#[test]
fn test_sales_group_by_period() {
    let q = SalesQueryBuilder::new()
        .group_by_period("MONTH")
        .build()
        .unwrap();
    assert_eq!(
        q.sql(),
        "SELECT DATE_TRUNC('month', sales.SalesDate) AS period, COUNT(*) AS total_sales, \
         SUM(sales.TotalPrice) AS total_revenue FROM sales \
         GROUP BY DATE_TRUNC('month', sales.SalesDate) ORDER BY period"
    );
    assert!(q.params().is_empty());
}

#[test]
fn test_sales_unsupported_granularity() {
    let err = SalesQueryBuilder::new()
        .group_by_period("week")
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::UnsupportedGranularity(ref g) if g == "week"));
}

#[test]
fn test_granularity_parse_and_display() {
    assert_eq!("Day".parse::<Granularity>().unwrap(), Granularity::Day);
    assert_eq!(Granularity::Year.to_string(), "year");
    assert!("quarter".parse::<Granularity>().is_err());
}

#[test]
fn test_sales_group_by_category_joins_both_tables_once() {
    let q = SalesQueryBuilder::new()
        .with_product_category(2)
        .group_by_category()
        .group_by_category()
        .build()
        .unwrap();
    let sql = q.sql();
    assert_eq!(sql.matches("INNER JOIN products p").count(), 1);
    assert_eq!(sql.matches("INNER JOIN categories c").count(), 1);
    assert_eq!(sql.matches("c.CategoryName").count(), 2);
    assert!(sql.ends_with("GROUP BY c.CategoryID, c.CategoryName"));
}

#[test]
fn test_sales_customer_min_purchases() {
    let q = SalesQueryBuilder::new()
        .group_by_customer()
        .min_purchases(3)
        .order_by(["total_spent DESC"])
        .limit(20)
        .build()
        .unwrap();
    let sql = q.sql();
    assert!(sql.contains("INNER JOIN customers cu ON sales.CustomerID = cu.CustomerID"));
    assert!(sql.contains(
        "GROUP BY cu.CustomerID, cu.FirstName, cu.LastName HAVING COUNT(*) >= :min_purchases"
    ));
    assert!(sql.ends_with("ORDER BY total_spent DESC LIMIT 20"));
    assert_eq!(q.params().get("min_purchases"), Some(&Value::Int(3)));
}

#[test]
fn test_sales_min_purchases_twice_is_unchanged() {
    let q = SalesQueryBuilder::new()
        .group_by_customer()
        .min_purchases(2)
        .min_purchases(2)
        .build()
        .unwrap();
    assert_eq!(q.sql().matches("COUNT(*) >= :min_purchases").count(), 1);
    assert_eq!(q.params().get("min_purchases"), Some(&Value::Int(2)));
}

#[test]
fn test_sales_min_purchases_conflict_is_ambiguous() {
    let err = SalesQueryBuilder::new()
        .group_by_customer()
        .min_purchases(2)
        .min_purchases(5)
        .build()
        .unwrap_err();
    assert!(matches!(err, SqlError::AmbiguousParameter { ref name, .. } if name == "min_purchases"));
}

#[test]
fn test_has_having_matches_exact_fragment() {
    let qb = QueryBuilder::new()
        .from_table("sales")
        .group_by(["CustomerID"])
        .having_raw("COUNT(*) > 1");
    assert!(qb.has_having("COUNT(*) > 1"));
    assert!(!qb.has_having("COUNT(*) > 2"));
}

#[test]
fn test_sales_employee_filter_and_grouping() {
    let q = SalesQueryBuilder::new()
        .with_employee(9)
        .group_by_employee()
        .build()
        .unwrap();
    assert!(q.sql().contains("WHERE sales.SalesPersonID = :employee_id"));
    assert!(q.sql().contains("AVG(sales.TotalPrice) AS avg_sale_value"));
    let (_, values) = q.to_positional().unwrap();
    assert_eq!(values, vec![Value::Int(9)]);
}

#[test]
fn test_sales_positional_order_follows_text() {
    let q = SalesQueryBuilder::new()
        .with_date_range("2024-01-01", "2024-01-31")
        .with_customer(42)
        .build()
        .unwrap();
    let (sql, values) = q.to_positional().unwrap();
    assert!(sql.ends_with("BETWEEN $1 AND $2 AND sales.CustomerID = $3"));
    assert_eq!(
        values,
        vec![
            Value::Date(ymd(2024, 1, 1)),
            Value::Date(ymd(2024, 1, 31)),
            Value::Int(42)
        ]
    );
}

#[test]
fn test_sales_into_inner_allows_raw_clauses() {
    let q = SalesQueryBuilder::new()
        .group_by_product()
        .into_inner()
        .and_where_raw("sales.Discount > 0")
        .build()
        .unwrap();
    assert!(q.sql().contains("WHERE sales.Discount > 0 GROUP BY"));
}
