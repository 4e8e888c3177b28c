//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "carelink.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Carelink configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your FHIR server settings", self.output);
                println!("  2. Create a .env file with your credentials:");
                println!("     - Set CARELINK_FHIR_BEARER_TOKEN, or");
                println!("     - Set CARELINK_FHIR_USERNAME and CARELINK_FHIR_PASSWORD");
                println!("  3. Validate configuration: carelink validate-config");
                println!("  4. Check connectivity: carelink health");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# Carelink Configuration File

environment = "development"

[application]
log_level = "info"

[fhir]
base_url = "https://fhir.example.com/r4"
auth_type = "bearer"
bearer_token = "${CARELINK_FHIR_BEARER_TOKEN}"
tls_verify = true
timeout_seconds = 60
page_size = 200

[fhir.retry]
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 2.0

[lifecycle]
episode_horizon_hours = 876000
serialize_episode_starts = true

[organization]
identifier_system = "urn:carelink:provider-code"

[[access.grants]]
subject = "carelink-cli"
permissions = ["end_episode", "read_episode", "delete_patient"]

[logging]
local_enabled = false
local_path = "/var/log/carelink"
local_rotation = "daily"
json_console = false
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# Carelink Configuration File
#
# Episode-of-care lifecycle and patient compartment erasure against a
# FHIR R4 server. Every value can reference environment variables with
# ${VAR}, and CARELINK_<SECTION>_<KEY> variables override file values.

# Runtime environment: development | staging | production
# TLS verification cannot be disabled in production.
environment = "development"

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# FHIR Server
# ============================================================================
[fhir]
# Base URL of the FHIR R4 endpoint
base_url = "https://fhir.example.com/r4"

# Authentication: none | basic | bearer
auth_type = "bearer"
bearer_token = "${CARELINK_FHIR_BEARER_TOKEN}"
# username = "${CARELINK_FHIR_USERNAME}"
# password = "${CARELINK_FHIR_PASSWORD}"

# TLS/SSL verification
tls_verify = true

# Per-request timeout in seconds
timeout_seconds = 60

# Page size requested when reading Patient/$everything (1-1000)
page_size = 200

# Retries apply to connection errors, timeouts, 429 and 5xx only
[fhir.retry]
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 2.0

# ============================================================================
# Episode Lifecycle
# ============================================================================
[lifecycle]
# New episodes get period.end = start + this many hours (about 100 years)
episode_horizon_hours = 876000

# Serialise concurrent episode starts for the same patient and
# organization within this process
serialize_episode_starts = true

# ============================================================================
# Organizations
# ============================================================================
[organization]
# Identifier system under which provider codes are stored
identifier_system = "urn:carelink:provider-code"

# ============================================================================
# Access Grants
# ============================================================================
# Permissions: start_episode, upgrade_episode, end_episode, read_episode,
# start_encounter, end_encounter, delete_patient, or "*" for all
[[access.grants]]
subject = "carelink-cli"
permissions = ["end_episode", "read_episode", "delete_patient"]

# [[access.grants]]
# subject = "episode-service"
# permissions = ["*"]

# ============================================================================
# Logging Configuration
# ============================================================================
[logging]
# Enable JSON file logging
local_enabled = false

# Local log directory
local_path = "/var/log/carelink"

# Log rotation: daily | hourly | never
local_rotation = "daily"

# Emit console logs as JSON
json_console = false
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;
    use tempfile::TempDir;

    #[test]
    fn test_init_args_defaults() {
        let args = InitArgs {
            output: "carelink.toml".to_string(),
            with_examples: false,
            force: false,
        };

        assert_eq!(args.output, "carelink.toml");
        assert!(!args.with_examples);
        assert!(!args.force);
    }

    #[test]
    fn test_generated_configs_parse() {
        std::env::set_var("CARELINK_FHIR_BEARER_TOKEN", "init-test-token");

        for content in [
            InitArgs::generate_minimal_config(),
            InitArgs::generate_config_with_examples(),
        ] {
            let config = load_config_from_str(&content).unwrap();
            config.validate().unwrap();
            assert_eq!(config.lifecycle.episode_horizon_hours, 876_000);
            assert_eq!(config.access.grants.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("carelink.toml");
        std::fs::write(&path, "existing").unwrap();

        let args = InitArgs {
            output: path.to_string_lossy().to_string(),
            with_examples: false,
            force: false,
        };
        assert_eq!(args.execute().await.unwrap(), 2);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing");
    }
}
