//! Configuration schema types
//!
//! This module defines the configuration structure for Carelink. Every
//! component receives its section explicitly at construction time.

use crate::adapters::access::Permission;
use crate::config::SecretString;
use serde::{Deserialize, Serialize};

/// Runtime environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment
    #[default]
    Development,
    /// Staging environment
    Staging,
    /// Production environment
    Production,
}

/// Main Carelink configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarelinkConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: Environment,

    /// Remote FHIR store connection
    pub fhir: FhirConfig,

    /// Episode lifecycle settings
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Organization resolution settings
    #[serde(default)]
    pub organization: OrganizationConfig,

    /// Static permission grants
    #[serde(default)]
    pub access: AccessConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CarelinkConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.fhir.validate(&self.environment)?;
        self.lifecycle.validate()?;
        self.organization.validate()?;
        self.access.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("fhir.retry.max_retries must be >= 1".to_string());
        }
        if self.backoff_multiplier < 1.0 {
            return Err(format!(
                "fhir.retry.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err("fhir.retry.initial_delay_ms cannot exceed max_delay_ms".to_string());
        }
        Ok(())
    }
}

/// Remote FHIR store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FhirConfig {
    /// Base URL of the FHIR R4 endpoint (no trailing resource type)
    pub base_url: String,

    /// Authentication type: none, basic or bearer
    #[serde(default = "default_auth_type")]
    pub auth_type: String,

    /// Username for basic authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Static bearer token
    #[serde(default)]
    pub bearer_token: Option<SecretString>,

    /// TLS certificate verification enabled
    ///
    /// Must stay `true` in production (enforced by validation).
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Page size requested from search and `$everything`
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,
}

impl FhirConfig {
    fn validate(&self, environment: &Environment) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_url.is_empty() {
            return Err("fhir.base_url cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("fhir.base_url must start with http:// or https://".to_string());
        }

        match self.auth_type.as_str() {
            "none" => {}
            "basic" => {
                if self.username.as_deref().map(str::is_empty).unwrap_or(true) {
                    return Err(
                        "fhir.username cannot be empty when auth_type is 'basic'".to_string()
                    );
                }
                if self
                    .password
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(
                        "fhir.password cannot be empty when auth_type is 'basic'".to_string()
                    );
                }
            }
            "bearer" => {
                if self
                    .bearer_token
                    .as_ref()
                    .map(|s| s.expose_secret().is_empty())
                    .unwrap_or(true)
                {
                    return Err(
                        "fhir.bearer_token cannot be empty when auth_type is 'bearer'"
                            .to_string(),
                    );
                }
            }
            other => {
                return Err(format!(
                    "Invalid auth_type '{other}'. Must be one of: none, basic, bearer"
                ))
            }
        }

        if *environment == Environment::Production && !self.tls_verify {
            return Err(
                "TLS certificate verification cannot be disabled in production environments"
                    .to_string(),
            );
        }

        if self.timeout_seconds == 0 {
            return Err("fhir.timeout_seconds must be > 0".to_string());
        }

        if !(1..=1000).contains(&self.page_size) {
            return Err(format!(
                "fhir.page_size must be between 1 and 1000, got {}",
                self.page_size
            ));
        }

        self.retry.validate()?;
        Ok(())
    }
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/fhir".to_string(),
            auth_type: default_auth_type(),
            username: None,
            password: None,
            bearer_token: None,
            tls_verify: true,
            timeout_seconds: default_timeout_seconds(),
            page_size: default_page_size(),
            retry: RetryConfig::default(),
        }
    }
}

/// Largest accepted episode horizon, ten times the default
pub const MAX_EPISODE_HORIZON_HOURS: i64 = 10 * 100 * 365 * 24;

/// Episode lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Hours added to the start time to form a new episode's period end
    #[serde(default = "default_episode_horizon_hours")]
    pub episode_horizon_hours: i64,

    /// Serialize episode starts per (patient, organization) within this process
    #[serde(default = "default_true")]
    pub serialize_episode_starts: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            episode_horizon_hours: default_episode_horizon_hours(),
            serialize_episode_starts: true,
        }
    }
}

impl LifecycleConfig {
    fn validate(&self) -> Result<(), String> {
        if self.episode_horizon_hours <= 24 {
            return Err(format!(
                "lifecycle.episode_horizon_hours must be greater than 24, got {}",
                self.episode_horizon_hours
            ));
        }
        if self.episode_horizon_hours > MAX_EPISODE_HORIZON_HOURS {
            return Err(format!(
                "lifecycle.episode_horizon_hours must be at most {MAX_EPISODE_HORIZON_HOURS}, got {}",
                self.episode_horizon_hours
            ));
        }
        Ok(())
    }
}

/// Organization resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    /// Identifier system provider codes are stored under
    #[serde(default = "default_identifier_system")]
    pub identifier_system: String,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            identifier_system: default_identifier_system(),
        }
    }
}

impl OrganizationConfig {
    fn validate(&self) -> Result<(), String> {
        if self.identifier_system.trim().is_empty() {
            return Err("organization.identifier_system cannot be empty".to_string());
        }
        if self.identifier_system.contains('|') {
            return Err("organization.identifier_system cannot contain '|'".to_string());
        }
        Ok(())
    }
}

/// Static permission grants
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Grants keyed by caller subject
    #[serde(default)]
    pub grants: Vec<GrantConfig>,
}

/// Permissions granted to one caller subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantConfig {
    /// Caller subject (e.g. a service account name)
    pub subject: String,

    /// Permission names, e.g. `end_episode`, or `*` for all
    pub permissions: Vec<String>,
}

impl AccessConfig {
    fn validate(&self) -> Result<(), String> {
        for grant in &self.grants {
            if grant.subject.trim().is_empty() {
                return Err("access.grants.subject cannot be empty".to_string());
            }
            for name in &grant.permissions {
                if name != "*" && name.parse::<Permission>().is_err() {
                    return Err(format!(
                        "Unknown permission '{name}' for subject '{}'",
                        grant.subject
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default)]
    pub local_enabled: bool,

    /// Local log file directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Emit console logs as JSON instead of human-readable text
    #[serde(default)]
    pub json_console: bool,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path cannot be empty when local logging is enabled".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            json_console: false,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_auth_type() -> String {
    "none".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_page_size() -> usize {
    200
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// 100 years of 365 days, in hours
fn default_episode_horizon_hours() -> i64 {
    100 * 365 * 24
}

fn default_identifier_system() -> String {
    "urn:carelink:provider-code".to_string()
}

fn default_local_path() -> String {
    "/var/log/carelink".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
