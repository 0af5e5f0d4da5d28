mod cli;
mod commands;
mod output;
mod utils;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::commands::handle_command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli);

    handle_command(cli).await
}

/// Directive used when `RUST_LOG` is unset
fn default_directive(cli: &Cli) -> &'static str {
    match (cli.debug, cli.verbose) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    }
}

fn log_filter(cli: &Cli) -> EnvFilter {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(default_directive(cli)),
    }
}

fn setup_logging(cli: &Cli) {
    // stderr keeps JSON on stdout parseable
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
