use clap::Parser;
use procdispatch::cli::{run_cli, Cli};
use procdispatch::telemetry::{init_logging, LogConfig};
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _logging = init_logging(&LogConfig::from_env())?;

    let stdout = std::io::stdout();
    let outcome = run_cli(&cli, &mut stdout.lock())?;
    Ok(outcome.into())
}
