// Carelink - Episode lifecycle and patient erasure for FHIR servers
// Copyright (c) 2025 Carelink Contributors
// Licensed under the MIT License

use carelink::cli::{Cli, Commands};
use carelink::config::load_config;
use carelink::logging::init_logging;
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logging settings come from the config when it loads; commands that
    // fail to load it still get console output.
    let loaded = load_config(&cli.config).ok();
    let log_level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().map(|c| c.application.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    let logging_config = loaded.map(|c| c.logging).unwrap_or_default();
    let guard = match init_logging(&log_level, &logging_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(5);
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Carelink");

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    // process::exit skips destructors
    drop(guard);
    process::exit(exit_code);
}

async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::ValidateConfig(args) => args.execute(&cli.config).await,
        Commands::Init(args) => args.execute().await,
        Commands::ErasePatient(args) => args.execute(&cli.config, &cli.subject).await,
        Commands::EndEpisode(args) => args.execute(&cli.config, &cli.subject).await,
        Commands::Health(args) => args.execute(&cli.config).await,
    }
}
