//! CLI interface and argument parsing
//!
//! This module provides the operator command-line interface for Carelink
//! using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Carelink - episode lifecycle and patient erasure for FHIR servers
#[derive(Parser, Debug)]
#[command(name = "carelink")]
#[command(version, about, long_about = None)]
#[command(author = "Carelink Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "carelink.toml", env = "CARELINK_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CARELINK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Caller subject checked against the configured access grants
    #[arg(long, default_value = "carelink-cli", env = "CARELINK_SUBJECT")]
    pub subject: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),

    /// Delete a patient and everything in their compartment
    ErasePatient(commands::erase::EraseArgs),

    /// End an active episode of care and its open encounters
    EndEpisode(commands::episode::EndEpisodeArgs),

    /// Check connectivity to the FHIR server
    Health(commands::health::HealthArgs),
}
