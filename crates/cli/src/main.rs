use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod args;
mod config;
mod output;
mod run;

use args::Cli;
use config::{CliConfig, LogFormat};

const DEFAULT_LOG_FILTER: &str = "orbit_cli=info,orbit_pipeline=info";

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Configuration ---
    let config = match CliConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // --- Tracing (stderr; stdout carries the result) ---
    init_tracing(config.log_format);
    tracing::debug!(api_url = %config.api_url, ws_url = %config.ws_url, "Loaded configuration");

    // --- Run ---
    match run::execute(&cli, &config).await {
        Ok(report) => {
            output::emit_success(&report, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::debug!(code = e.code().as_str(), error = %e, "Run failed");
            output::emit_error(&e, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
