//! Remote FHIR store adapter
//!
//! [`ResourceClient`] is the contract; [`HttpResourceClient`] is the
//! REST implementation.

pub mod client;
pub mod http;

pub use client::{FhirResult, PatchOp, PatchOperation, ResourceClient, SearchParams};
pub use http::HttpResourceClient;
