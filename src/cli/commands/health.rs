//! Health command implementation
//!
//! Checks that the configured FHIR server is reachable and accepts the
//! configured credentials.

use super::build_runtime;
use clap::Args;

/// Arguments for the health command
#[derive(Args, Debug)]
pub struct HealthArgs {}

impl HealthArgs {
    /// Execute the health command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let runtime = match build_runtime(config_path) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };

        println!("🩺 Checking FHIR server: {}", runtime.config.fhir.base_url);

        match runtime.client.capability_statement().await {
            Ok(statement) => {
                let version = statement
                    .get("fhirVersion")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                let software = statement
                    .pointer("/software/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown");
                tracing::info!(fhir_version = %version, software = %software, "FHIR server healthy");
                println!("✅ Server is reachable");
                println!("   FHIR version: {version}");
                println!("   Software: {software}");
                Ok(0)
            }
            Err(e) => {
                tracing::error!(error = %e, "FHIR server health check failed");
                println!("❌ Server check failed");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}
