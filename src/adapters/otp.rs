//! One-time-passcode verification contract
//!
//! OTP delivery and checking live in an external service. The lifecycle
//! manager only needs a yes/no answer plus the normalised phone number.

use crate::domain::{CarelinkError, Result};
use async_trait::async_trait;

/// Outcome of a verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpVerification {
    /// Whether the code matched
    pub verified: bool,
    /// Phone number in the verifier's canonical form
    pub normalized_phone: String,
}

/// Checks a phone number + one-time passcode pair
#[async_trait]
pub trait OtpVerifier: Send + Sync {
    /// Verifies `code` against `phone_number`
    ///
    /// # Errors
    ///
    /// Returns an error when the verifier cannot evaluate the pair at all
    /// (unparseable number, service failure). A wrong code is
    /// `Ok(OtpVerification { verified: false, .. })`.
    async fn verify(&self, phone_number: &str, code: &str) -> Result<OtpVerification>;
}

/// Verifier for processes that have no OTP service configured
///
/// Every verification fails, so OTP-gated transitions are refused while
/// the rest of the lifecycle stays usable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableOtpVerifier;

#[async_trait]
impl OtpVerifier for UnavailableOtpVerifier {
    async fn verify(&self, _phone_number: &str, _code: &str) -> Result<OtpVerification> {
        Err(CarelinkError::Verification(
            "no OTP verifier is configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_verifier_always_errors() {
        let result = UnavailableOtpVerifier.verify("+15550100", "123456").await;
        assert!(matches!(result, Err(CarelinkError::Verification(_))));
    }
}
