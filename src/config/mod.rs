//! Configuration management for Carelink.
//!
//! Carelink reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CARELINK_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "production"
//!
//! [application]
//! log_level = "info"
//!
//! [fhir]
//! base_url = "https://fhir.example.com/r4"
//! auth_type = "bearer"
//! bearer_token = "${CARELINK_FHIR_TOKEN}"
//!
//! [fhir.retry]
//! max_retries = 3
//!
//! [lifecycle]
//! episode_horizon_hours = 876000
//!
//! [organization]
//! identifier_system = "urn:carelink:provider-code"
//!
//! [[access.grants]]
//! subject = "erasure-job"
//! permissions = ["delete_patient"]
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use carelink::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("carelink.toml")?;
//! println!("FHIR store: {}", config.fhir.base_url);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    AccessConfig, ApplicationConfig, CarelinkConfig, Environment, FhirConfig, GrantConfig,
    LifecycleConfig, LoggingConfig, OrganizationConfig, RetryConfig, MAX_EPISODE_HORIZON_HOURS,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
