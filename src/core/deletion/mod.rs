//! Patient compartment deletion
//!
//! - [`plan`] - Bucketing of `$everything` entries into a [`DeletionPlan`]
//! - [`orchestrator`] - [`CompartmentDeletionOrchestrator`], which drains
//!   the plan against the remote store

pub mod orchestrator;
pub mod plan;

pub use orchestrator::CompartmentDeletionOrchestrator;
pub use plan::{DeletionBucket, DeletionPlan};
