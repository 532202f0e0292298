use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Report,
    Reports,
    Sql,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Reports,
    Report(ReportRunArgs),
    Sql(SqlShowArgs),
}

#[derive(Debug, Clone)]
pub struct ReportRunArgs {
    pub tag: String,
    /// Raw `name=value` pairs, in command-line order.
    pub args: Vec<String>,
    pub config: Option<PathBuf>,
    pub database: Option<String>,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct SqlShowArgs {
    pub tag: String,
    pub args: Vec<String>,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "reports" => parse_reports(it.map(|s| s.as_str())),
        "report" => parse_report(it.map(|s| s.as_str())),
        "sql" => parse_sql(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

fn parse_reports<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    match it.next() {
        None => Ok(Command::Reports),
        Some("-h" | "--help") => Ok(Command::Help(HelpTopic::Reports)),
        Some(other) => anyhow::bail!("unknown argument: {other}"),
    }
}

fn parse_report<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut tag: Option<String> = None;
    let mut pairs: Vec<String> = Vec::new();
    let mut config: Option<PathBuf> = None;
    let mut database: Option<String> = None;
    let mut json = false;

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Report)),
            "--arg" | "-a" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("{token} requires a value");
                };
                pairs.push(arg_pair(v)?);
            }
            _ if token.starts_with("--arg=") => {
                pairs.push(arg_pair(token.trim_start_matches("--arg="))?);
            }
            "--config" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--config requires a value");
                };
                config = Some(PathBuf::from(v));
            }
            _ if token.starts_with("--config=") => {
                config = Some(PathBuf::from(token.trim_start_matches("--config=")));
            }
            "--database" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("--database requires a value");
                };
                database = Some(v.to_string());
            }
            _ if token.starts_with("--database=") => {
                database = Some(token.trim_start_matches("--database=").to_string());
            }
            "--json" => json = true,
            _ if token.starts_with('-') => anyhow::bail!("unknown argument: {token}"),
            _ if tag.is_none() => tag = Some(token.to_string()),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    let Some(tag) = tag else {
        anyhow::bail!("missing report type (run `salesql reports` to list them)");
    };

    Ok(Command::Report(ReportRunArgs {
        tag,
        args: pairs,
        config,
        database,
        json,
    }))
}

fn parse_sql<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut tag: Option<String> = None;
    let mut pairs: Vec<String> = Vec::new();

    while let Some(token) = it.next() {
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Sql)),
            "--arg" | "-a" => {
                let Some(v) = it.next() else {
                    anyhow::bail!("{token} requires a value");
                };
                pairs.push(arg_pair(v)?);
            }
            _ if token.starts_with("--arg=") => {
                pairs.push(arg_pair(token.trim_start_matches("--arg="))?);
            }
            _ if token.starts_with('-') => anyhow::bail!("unknown argument: {token}"),
            _ if tag.is_none() => tag = Some(token.to_string()),
            other => anyhow::bail!("unexpected argument: {other}"),
        }
    }

    let Some(tag) = tag else {
        anyhow::bail!("missing report type");
    };

    Ok(Command::Sql(SqlShowArgs { tag, args: pairs }))
}

fn arg_pair(v: &str) -> anyhow::Result<String> {
    if !v.contains('=') {
        anyhow::bail!("report arguments take the form name=value, got `{v}`");
    }
    Ok(v.to_string())
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
salesql - sales reports over PostgreSQL

USAGE:
  salesql <COMMAND> [OPTIONS]

COMMANDS:
  reports       List available report types and their arguments
  report        Run a report and print the result
  sql           Print the SQL a report would run, without connecting

Logging is controlled by RUST_LOG (default: warn).
Run `salesql <command> --help` for more."
            );
        }
        HelpTopic::Reports => {
            println!(
                "\
USAGE:
  salesql reports

Lists every registered report type with its required and optional arguments."
            );
        }
        HelpTopic::Report => {
            println!(
                "\
USAGE:
  salesql report <TYPE> [OPTIONS]

OPTIONS:
  -a, --arg <NAME=VALUE>  Report argument (repeatable)
  --config <FILE>         Config file path (default: salesql.toml if present)
  --database <URL>        Connection URL; overrides the config file and DB_* variables
  --json                  Print the report as JSON instead of tables
  -h, --help              Print help

EXAMPLE:
  salesql report sales --arg start_date=2024-01-01 --arg end_date=2024-03-31"
            );
        }
        HelpTopic::Sql => {
            println!(
                "\
USAGE:
  salesql sql <TYPE> [OPTIONS]

OPTIONS:
  -a, --arg <NAME=VALUE>  Report argument (repeatable)
  -h, --help              Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        std::iter::once("salesql")
            .chain(parts.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn no_arguments_prints_root_help() {
        let cmd = parse_args(&argv(&[])).unwrap();
        assert!(matches!(cmd, Command::Help(HelpTopic::Root)));
    }

    #[test]
    fn parse_report_with_args_and_options() {
        let cmd = parse_args(&argv(&[
            "report",
            "sales",
            "--arg",
            "start_date=2024-01-01",
            "-a",
            "end_date=2024-03-31",
            "--config=db.toml",
            "--json",
        ]))
        .unwrap();
        let Command::Report(run) = cmd else {
            panic!("expected report");
        };

        assert_eq!(run.tag, "sales");
        assert_eq!(run.args, vec!["start_date=2024-01-01", "end_date=2024-03-31"]);
        assert_eq!(run.config, Some(PathBuf::from("db.toml")));
        assert!(run.database.is_none());
        assert!(run.json);
    }

    #[test]
    fn report_requires_a_type() {
        let err = parse_args(&argv(&["report", "--json"])).unwrap_err();
        assert!(err.to_string().contains("missing report type"));
    }

    #[test]
    fn malformed_arg_is_rejected() {
        let err = parse_args(&argv(&["sql", "product", "--arg", "limit"])).unwrap_err();
        assert!(err.to_string().contains("name=value"));
    }

    #[test]
    fn second_positional_is_rejected() {
        assert!(parse_args(&argv(&["report", "sales", "product"])).is_err());
    }

    #[test]
    fn subcommand_help() {
        let cmd = parse_args(&argv(&["sql", "product", "--help"])).unwrap();
        assert!(matches!(cmd, Command::Help(HelpTopic::Sql)));
        let cmd = parse_args(&argv(&["reports", "-h"])).unwrap();
        assert!(matches!(cmd, Command::Help(HelpTopic::Reports)));
    }

    #[test]
    fn unknown_command() {
        let err = parse_args(&argv(&["frobnicate"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown command: frobnicate");
    }
}
