//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CarelinkConfig;
use super::secret::secret_string;
use crate::domain::errors::CarelinkError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`CarelinkConfig`]
/// 4. Applies environment variable overrides (`CARELINK_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`CarelinkError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use carelink::config::loader::load_config;
///
/// let config = load_config("carelink.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CarelinkConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CarelinkError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CarelinkError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Same as [`load_config`] but from an in-memory TOML document
pub fn load_config_from_str(contents: &str) -> Result<CarelinkConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CarelinkConfig = toml::from_str(&contents)
        .map_err(|e| CarelinkError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        CarelinkError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CarelinkError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(CarelinkError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the `CARELINK_*` prefix
///
/// Variables follow the pattern `CARELINK_<SECTION>_<KEY>`, for example
/// `CARELINK_FHIR_BASE_URL`. Unparseable numeric or boolean values are
/// ignored and the file value kept.
fn apply_env_overrides(config: &mut CarelinkConfig) {
    if let Ok(val) = std::env::var("CARELINK_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    // FHIR store overrides
    if let Ok(val) = std::env::var("CARELINK_FHIR_BASE_URL") {
        config.fhir.base_url = val;
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_AUTH_TYPE") {
        config.fhir.auth_type = val;
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_USERNAME") {
        config.fhir.username = Some(val);
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_PASSWORD") {
        config.fhir.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_BEARER_TOKEN") {
        config.fhir.bearer_token = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_TLS_VERIFY") {
        if let Ok(flag) = val.parse() {
            config.fhir.tls_verify = flag;
        }
    }
    if let Ok(val) = std::env::var("CARELINK_FHIR_TIMEOUT_SECONDS") {
        if let Ok(secs) = val.parse() {
            config.fhir.timeout_seconds = secs;
        }
    }

    // Lifecycle overrides
    if let Ok(val) = std::env::var("CARELINK_LIFECYCLE_EPISODE_HORIZON_HOURS") {
        if let Ok(hours) = val.parse() {
            config.lifecycle.episode_horizon_hours = hours;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CARELINK_LOGGING_LOCAL_ENABLED") {
        if let Ok(flag) = val.parse() {
            config.logging.local_enabled = flag;
        }
    }
    if let Ok(val) = std::env::var("CARELINK_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("CARELINK_UNIT_SUBST_VAR", "test_value");
        let input = "password = \"${CARELINK_UNIT_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("CARELINK_UNIT_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("CARELINK_UNIT_MISSING_VAR");
        let input = "password = \"${CARELINK_UNIT_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("CARELINK_UNIT_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# token = \"${CARELINK_UNIT_NEVER_SET}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_valid() {
        let toml_content = r#"
[fhir]
base_url = "https://fhir.example.com/r4"

[lifecycle]
episode_horizon_hours = 1000
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.fhir.base_url, "https://fhir.example.com/r4");
        assert_eq!(config.lifecycle.episode_horizon_hours, 1000);
        assert_eq!(config.application.log_level, "info");
    }
}
