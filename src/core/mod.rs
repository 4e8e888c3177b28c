//! Core business logic for Carelink.
//!
//! # Modules
//!
//! - [`lifecycle`] - Episode and encounter state transitions
//! - [`deletion`] - Dependency-ordered deletion of a patient compartment
//!
//! # Example
//!
//! ```rust,no_run
//! use carelink::adapters::access::{RequestContext, StaticAccessGuard};
//! use carelink::adapters::fhir::HttpResourceClient;
//! use carelink::config::load_config;
//! use carelink::core::deletion::CompartmentDeletionOrchestrator;
//! use carelink::domain::PatientId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("carelink.toml")?;
//! let client = Arc::new(HttpResourceClient::new(config.fhir.clone())?);
//! let guard = Arc::new(StaticAccessGuard::from_config(&config.access)?);
//!
//! let orchestrator = CompartmentDeletionOrchestrator::new(client, guard);
//! let ctx = RequestContext::for_subject("operator");
//! let deleted = orchestrator
//!     .delete_patient_compartment(&ctx, &PatientId::new("p-123")?)
//!     .await?;
//! println!("deleted: {deleted}");
//! # Ok(())
//! # }
//! ```

pub mod deletion;
pub mod lifecycle;
