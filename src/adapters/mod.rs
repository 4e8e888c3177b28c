//! External system integrations for Carelink.
//!
//! - [`fhir`] - Remote FHIR store contract and REST client
//! - [`access`] - Caller resolution and permission checks
//! - [`otp`] - One-time-passcode verification contract
//! - [`organization`] - Provider code to Organization resolution
//!
//! # Design Pattern
//!
//! Every collaborator sits behind an `async_trait` so the lifecycle manager
//! and the deletion orchestrator can be driven by in-memory fakes in tests.
//!
//! ```rust,no_run
//! use carelink::adapters::fhir::HttpResourceClient;
//! use carelink::config::FhirConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FhirConfig {
//!     base_url: "https://fhir.example.com/r4".to_string(),
//!     ..Default::default()
//! };
//! let client = HttpResourceClient::new(config)?;
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod fhir;
pub mod organization;
pub mod otp;
