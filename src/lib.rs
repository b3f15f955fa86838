pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

pub async fn run() -> ExitCode {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let json = cli.json;
    match commands::handle(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            commands::output::print_error(json, &err);
            ExitCode::FAILURE
        }
    }
}
