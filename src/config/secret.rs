//! Secure credential handling using the secrecy crate
//!
//! Store credentials (`fhir.password`, `fhir.bearer_token`) are held in
//! [`SecretString`], which zeroes memory on drop and redacts `Debug` output.
//!
//! ```rust
//! use carelink::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("s3cr3t".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "s3cr3t");
//! assert!(!format!("{token:?}").contains("s3cr3t"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Newtype wrapper for String that implements the required traits for Secret
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// Type alias for a secret string
pub type SecretString = Secret<SecretValue>;

/// Wraps a String in a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Wraps an optional String in an optional [`SecretString`]
#[inline]
pub fn secret_string_opt(value: Option<String>) -> Option<SecretString> {
    value.map(secret_string)
}
