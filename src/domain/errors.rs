//! Domain error types
//!
//! This module defines the error hierarchy for Carelink.
//! All errors are domain-specific and don't expose third-party types.

use thiserror::Error;

/// Main Carelink error type
///
/// This is the primary error type used throughout the library.
/// Lifecycle and deletion operations surface one of the categories below;
/// only remote failures carry a nested [`FhirError`].
#[derive(Debug, Error)]
pub enum CarelinkError {
    /// Caller lacks the permission an operation requires
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// A domain precondition did not hold (e.g. inactive episode)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// OTP or phone verification failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// A remote store call failed, wrapped with the operation that issued it
    #[error("{operation} on {resource_type} failed: {source}")]
    Remote {
        /// Lifecycle or deletion operation name
        operation: &'static str,
        /// Resource type the call targeted
        resource_type: String,
        /// Underlying remote error
        #[source]
        source: FhirError,
    },

    /// Unwrapped remote store error
    #[error("FHIR error: {0}")]
    Fhir(#[from] FhirError),

    /// The compartment bundle could not be decoded
    #[error("Malformed compartment: {0}")]
    MalformedCompartment(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors for identifiers and payloads
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CarelinkError {
    /// Wraps a remote error with the operation and resource type it came from
    pub fn remote(
        operation: &'static str,
        resource_type: impl Into<String>,
        source: FhirError,
    ) -> Self {
        CarelinkError::Remote {
            operation,
            resource_type: resource_type.into(),
            source,
        }
    }

    /// Re-wraps an error with operation context
    ///
    /// Remote errors (wrapped or not) get the new operation name; every
    /// other category passes through untouched.
    pub fn in_operation(self, operation: &'static str, resource_type: &str) -> Self {
        match self {
            CarelinkError::Fhir(source) | CarelinkError::Remote { source, .. } => {
                CarelinkError::remote(operation, resource_type, source)
            }
            other => other,
        }
    }

    /// Returns the underlying remote error, if any
    pub fn fhir_error(&self) -> Option<&FhirError> {
        match self {
            CarelinkError::Fhir(e) | CarelinkError::Remote { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// FHIR store errors
///
/// Errors that occur when talking to the remote clinical-data store.
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FhirError {
    /// Failed to reach the server
    #[error("Failed to connect to FHIR server: {0}")]
    ConnectionFailed(String),

    /// Resource not found (404 / 410)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Referential or version conflict (409 / 412)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Response body could not be understood
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// Request timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

impl FhirError {
    /// Whether a retry has a chance of succeeding
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FhirError::ConnectionFailed(_)
                | FhirError::ServerError { .. }
                | FhirError::RateLimited(_)
                | FhirError::Timeout(_)
        )
    }

    /// Maps a non-success HTTP status and body to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            404 | 410 => FhirError::NotFound(message),
            409 | 412 => FhirError::Conflict(message),
            429 => FhirError::RateLimited(message),
            408 => FhirError::Timeout(message),
            500..=599 => FhirError::ServerError { status, message },
            _ => FhirError::ClientError { status, message },
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CarelinkError {
    fn from(err: std::io::Error) -> Self {
        CarelinkError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CarelinkError {
    fn from(err: serde_json::Error) -> Self {
        CarelinkError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CarelinkError {
    fn from(err: toml::de::Error) -> Self {
        CarelinkError::Configuration(format!("TOML parse error: {err}"))
    }
}
