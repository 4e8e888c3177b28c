//! Domain models and types for Carelink.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PatientId`], [`EpisodeId`], [`EncounterId`],
//!   [`OrganizationId`]) and the [`ResourceRef`] `(type, id)` pair
//! - **Clinical resources** ([`EpisodeOfCare`], [`Encounter`]) with their JSON codec
//! - **Bundle decoding** ([`Bundle`], [`CompartmentResource`])
//! - **Error types** ([`CarelinkError`], [`FhirError`]) and the [`Result`] alias
//!
//! # Type Safety
//!
//! ```rust
//! use carelink::domain::{EpisodeId, PatientId, ResourceRef};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let patient = PatientId::new("p-123")?;
//! let episode = EpisodeId::new("ep-456")?;
//!
//! assert_eq!(ResourceRef::from(&patient).to_string(), "Patient/p-123");
//! assert_eq!(ResourceRef::from(&episode).to_string(), "EpisodeOfCare/ep-456");
//! # Ok(())
//! # }
//! ```

pub mod bundle;
pub mod errors;
pub mod ids;
pub mod resources;
pub mod result;

// Re-export commonly used types for convenience
pub use bundle::{Bundle, BundleLink, CompartmentResource};
pub use errors::{CarelinkError, FhirError};
pub use ids::{EncounterId, EpisodeId, OrganizationId, PatientId, ResourceId, ResourceRef, ResourceType};
pub use resources::{
    AccessLevel, CodeableConcept, Coding, Encounter, EncounterStatus, EpisodeOfCare,
    EpisodeStatus, FhirDateTime, FhirResource, Period, Reference,
};
pub use result::Result;
