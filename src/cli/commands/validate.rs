//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Carelink configuration file.

use crate::config::load_config;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        match config.validate() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Configuration Summary:");
                println!("  Environment: {:?}", config.environment);
                println!("  Log Level: {}", config.application.log_level);
                println!("  FHIR Server: {}", config.fhir.base_url);
                println!("  FHIR Auth: {}", config.fhir.auth_type);
                println!("  Max Retries: {}", config.fhir.retry.max_retries);
                println!(
                    "  Episode Horizon: {} hours",
                    config.lifecycle.episode_horizon_hours
                );
                println!(
                    "  Organization Identifier System: {}",
                    config.organization.identifier_system
                );
                println!("  Access Grants: {}", config.access.grants.len());
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}
