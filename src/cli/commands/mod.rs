//! CLI command implementations

pub mod episode;
pub mod erase;
pub mod health;
pub mod init;
pub mod validate;

use crate::adapters::access::StaticAccessGuard;
use crate::adapters::fhir::HttpResourceClient;
use crate::config::{load_config, CarelinkConfig};
use std::sync::Arc;

/// Collaborators shared by the commands that talk to the remote store
pub(crate) struct Runtime {
    pub config: CarelinkConfig,
    pub client: Arc<HttpResourceClient>,
    pub guard: Arc<StaticAccessGuard>,
}

/// Loads and validates the config, then builds the HTTP client and guard
///
/// Prints the failure and returns the exit code on error.
pub(crate) fn build_runtime(config_path: &str) -> std::result::Result<Runtime, i32> {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            println!("❌ Failed to load configuration file");
            println!("   Error: {e}");
            return Err(2);
        }
    };
    if let Err(e) = config.validate() {
        println!("❌ Configuration validation failed");
        println!("   Error: {e}");
        return Err(2);
    }

    let client = match HttpResourceClient::new(config.fhir.clone()) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            println!("❌ Failed to create FHIR client");
            println!("   Error: {e}");
            return Err(2);
        }
    };
    let guard = match StaticAccessGuard::from_config(&config.access) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            println!("❌ Invalid access grants");
            println!("   Error: {e}");
            return Err(2);
        }
    };

    Ok(Runtime {
        config,
        client,
        guard,
    })
}
