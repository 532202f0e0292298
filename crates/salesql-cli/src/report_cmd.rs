use crate::cli::{ReportRunArgs, SqlShowArgs};
use crate::render;
use anyhow::Context;
use salesql::{ConnectionManager, DbConfig, Report, ReportArgs, ReportFactory};

fn create_report(tag: &str, pairs: &[String]) -> anyhow::Result<Box<dyn Report>> {
    let mut args = ReportArgs::new();
    for pair in pairs {
        args.insert_pair(pair)?;
    }
    ReportFactory::with_builtin_reports()
        .create(tag, &args)
        .with_context(|| format!("cannot create '{tag}' report"))
}

fn load_config(args: &ReportRunArgs) -> anyhow::Result<DbConfig> {
    let config = match &args.database {
        Some(url) => DbConfig::from_url(url)?,
        None => DbConfig::load(args.config.as_deref())?,
    };
    Ok(config)
}

pub fn list() -> anyhow::Result<()> {
    let factory = ReportFactory::with_builtin_reports();
    println!("{}", render::catalogue(factory.descriptors()));
    Ok(())
}

pub fn show_sql(args: SqlShowArgs) -> anyhow::Result<()> {
    let report = create_report(&args.tag, &args.args)?;
    println!("{}", render::query_listing(&report.query()?));
    Ok(())
}

pub async fn run(args: ReportRunArgs) -> anyhow::Result<()> {
    // Validate arguments before touching the network.
    let report = create_report(&args.tag, &args.args)?;
    let config = load_config(&args)?;

    let db = ConnectionManager::new();
    db.connect(&config).await.with_context(|| {
        format!(
            "failed to connect to {}:{}/{}",
            config.host, config.port, config.database
        )
    })?;

    let output = report.generate(&db).await;
    db.disconnect().await;
    let output = output.with_context(|| format!("'{}' report failed", args.tag))?;

    tracing::info!(kind = %output.kind, rows = output.rows.len(), "report generated");
    if args.json {
        println!("{}", render::output_json(&output)?);
    } else {
        println!("{}", render::output_tables(&output));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_report_parses_pairs() {
        let report = create_report("product", &["limit=3".to_string()]).unwrap();
        assert!(report.query().unwrap().sql().ends_with("LIMIT 3"));
    }

    #[test]
    fn create_report_names_the_tag_on_failure() {
        let err = create_report("sales", &[]).unwrap_err();
        assert!(format!("{err:#}").contains("'sales'"));
        assert!(format!("{err:#}").contains("start_date"));
    }
}
