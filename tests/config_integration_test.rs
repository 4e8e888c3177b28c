//! Integration tests for configuration loading and validation
//!
//! Tests that modify environment variables hold `ENV_MUTEX` so they do not
//! interfere with each other.

use carelink::config::{load_config, Environment};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for var in [
        "CARELINK_APPLICATION_LOG_LEVEL",
        "CARELINK_FHIR_BASE_URL",
        "CARELINK_FHIR_AUTH_TYPE",
        "CARELINK_FHIR_USERNAME",
        "CARELINK_FHIR_PASSWORD",
        "CARELINK_FHIR_BEARER_TOKEN",
        "CARELINK_FHIR_TLS_VERIFY",
        "CARELINK_FHIR_TIMEOUT_SECONDS",
        "CARELINK_LIFECYCLE_EPISODE_HORIZON_HOURS",
        "CARELINK_LOGGING_LOCAL_ENABLED",
        "CARELINK_LOGGING_LOCAL_PATH",
        "TEST_FHIR_TOKEN",
    ] {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(contents.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
environment = "staging"

[application]
log_level = "debug"

[fhir]
base_url = "https://fhir.example.com/r4"
auth_type = "basic"
username = "svc"
password = "hunter2"
tls_verify = true
timeout_seconds = 30
page_size = 100

[fhir.retry]
max_retries = 5
initial_delay_ms = 250
max_delay_ms = 4000
backoff_multiplier = 1.5

[lifecycle]
episode_horizon_hours = 8760
serialize_episode_starts = false

[organization]
identifier_system = "https://example.org/provider-codes"

[[access.grants]]
subject = "episode-service"
permissions = ["start_episode", "upgrade_episode", "end_episode"]

[[access.grants]]
subject = "admin"
permissions = ["*"]

[logging]
local_enabled = false
local_path = "/tmp/carelink"
local_rotation = "hourly"
json_console = true
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.fhir.base_url, "https://fhir.example.com/r4");
    assert_eq!(config.fhir.username.as_deref(), Some("svc"));
    assert_eq!(
        config.fhir.password.as_ref().unwrap().expose_secret().as_ref(),
        "hunter2"
    );
    assert_eq!(config.fhir.page_size, 100);
    assert_eq!(config.fhir.retry.max_retries, 5);
    assert_eq!(config.lifecycle.episode_horizon_hours, 8760);
    assert!(!config.lifecycle.serialize_episode_starts);
    assert_eq!(
        config.organization.identifier_system,
        "https://example.org/provider-codes"
    );
    assert_eq!(config.access.grants.len(), 2);
    assert_eq!(config.logging.local_rotation, "hourly");
    assert!(config.logging.json_console);
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[fhir]
base_url = "http://localhost:8080/fhir"
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");

    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.application.log_level, "info");
    assert_eq!(config.fhir.auth_type, "none");
    assert_eq!(config.fhir.timeout_seconds, 60);
    assert_eq!(config.fhir.page_size, 200);
    assert_eq!(config.fhir.retry.max_retries, 3);
    assert_eq!(config.lifecycle.episode_horizon_hours, 876_000);
    assert!(config.lifecycle.serialize_episode_starts);
    assert_eq!(
        config.organization.identifier_system,
        "urn:carelink:provider-code"
    );
    assert!(config.access.grants.is_empty());
    assert!(!config.logging.local_enabled);
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_FHIR_TOKEN", "token-from-env");

    let file = write_config(
        r#"
[fhir]
base_url = "https://fhir.example.com/r4"
auth_type = "bearer"
bearer_token = "${TEST_FHIR_TOKEN}"
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");
    assert_eq!(
        config
            .fhir
            .bearer_token
            .as_ref()
            .unwrap()
            .expose_secret()
            .as_ref(),
        "token-from-env"
    );

    cleanup_env_vars();
}

#[test]
fn test_missing_substitution_variable_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[fhir]
base_url = "https://fhir.example.com/r4"
auth_type = "bearer"
bearer_token = "${TEST_FHIR_TOKEN}"
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_FHIR_TOKEN"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("CARELINK_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("CARELINK_FHIR_BASE_URL", "https://override.example.com/fhir");
    std::env::set_var("CARELINK_LIFECYCLE_EPISODE_HORIZON_HOURS", "24000");

    let file = write_config(
        r#"
[application]
log_level = "info"

[fhir]
base_url = "https://fhir.example.com/r4"

[lifecycle]
episode_horizon_hours = 876000
"#,
    );

    let config = load_config(file.path()).expect("Failed to load config");

    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.fhir.base_url, "https://override.example.com/fhir");
    assert_eq!(config.lifecycle.episode_horizon_hours, 24_000);

    cleanup_env_vars();
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    for contents in [
        "[application]\nlog_level = \"loud\"\n[fhir]\nbase_url = \"https://f.example.com\"\n",
        "[fhir]\nbase_url = \"ftp://f.example.com\"\n",
        "[fhir]\nbase_url = \"https://f.example.com\"\nauth_type = \"basic\"\n",
        "[fhir]\nbase_url = \"https://f.example.com\"\n[lifecycle]\nepisode_horizon_hours = 0\n",
        "[fhir]\nbase_url = \"https://f.example.com\"\n[lifecycle]\nepisode_horizon_hours = 10000000000\n",
        "[fhir]\nbase_url = \"https://f.example.com\"\n[[access.grants]]\nsubject = \"x\"\npermissions = [\"drop_tables\"]\n",
        "environment = \"production\"\n[fhir]\nbase_url = \"https://f.example.com\"\ntls_verify = false\n",
    ] {
        let file = write_config(contents);
        assert!(
            load_config(file.path()).is_err(),
            "expected validation failure for:\n{contents}"
        );
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/carelink.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
