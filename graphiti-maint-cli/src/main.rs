mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // ── Tracing ───────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("graphiti_maint=info,graphiti_maint_cli=info"))?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    // ── Config ────────────────────────────────────────────────────────────────
    let config = config::load(&cli).map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;
    info!(
        uri = %config.neo4j_uri,
        database = %config.neo4j_database,
        embedding_dim = config.embedding_dim,
        "configuration loaded"
    );

    // ── Command ───────────────────────────────────────────────────────────────
    match commands::run(cli.command, &config, cli.json).await {
        Ok(outcome) => {
            info!(?outcome, "done");
            Ok(outcome.exit_code())
        }
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e:#}");
            Ok(ExitCode::from(1))
        }
    }
}
