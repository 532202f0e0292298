//! End-to-end checks against a real PostgreSQL holding the sales schema.
//!
//! Skipped unless `DATABASE_URL` is set.

use salesql::{ConnectionManager, DbConfig, Params, ReportArgs, ReportFactory, SqlResult, params};

fn database_url(test: &str) -> Option<String> {
    match std::env::var("DATABASE_URL") {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping {test}");
            None
        }
    }
}

#[tokio::test]
async fn connect_is_shared_and_reusable() -> SqlResult<()> {
    let Some(url) = database_url("connect_is_shared_and_reusable") else {
        return Ok(());
    };
    let config = DbConfig::from_url(&url)?;

    let db = ConnectionManager::new();
    let first = db.connect(&config).await?;
    let second = db.connect(&config).await?;
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(db.stats().handles_created, 1);

    let mut bound = Params::new();
    bound.merge(params!["n" => 7_i64])?;
    let rows = db.execute("SELECT CAST(:n AS bigint) AS n", &bound).await?;
    assert_eq!(rows[0].get("n").and_then(|v| v.as_i64()), Some(7));

    assert!(db.disconnect().await);
    assert!(!db.is_connected());
    Ok(())
}

#[tokio::test]
async fn every_builtin_report_generates() -> SqlResult<()> {
    let Some(url) = database_url("every_builtin_report_generates") else {
        return Ok(());
    };
    let db = ConnectionManager::new();
    db.connect(&DbConfig::from_url(&url)?).await?;

    let factory = ReportFactory::with_builtin_reports();
    let range = || {
        ReportArgs::new()
            .with("start_date", "2018-01-01")
            .with("end_date", "2018-12-31")
    };
    let cases = [
        ("sales", range()),
        ("product", ReportArgs::new().with("limit", 5)),
        ("employee", range()),
        ("category", range()),
        ("customer", ReportArgs::new().with("min_purchases", 2)),
        ("period", range().with("granularity", "month")),
    ];

    for (tag, args) in cases {
        let report = factory.create(tag, &args)?;
        let output = report.generate(&db).await?;
        assert_eq!(output.kind, tag);
    }
    Ok(())
}
