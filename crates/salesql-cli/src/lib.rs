mod cli;
mod render;
mod report_cmd;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Reports => report_cmd::list(),
        cli::Command::Report(args) => report_cmd::run(args).await,
        cli::Command::Sql(args) => report_cmd::show_sql(args),
    }
}
