//! tpcopy entry point.

mod args;
mod run;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize structured logging. Stdout is reserved for the outcome.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting tpcopy");

    let config = run::load_config(cli.config.as_deref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match &cli.command {
        Command::Copy(args) => rt.block_on(run::copy(args, config)),
    }
}
