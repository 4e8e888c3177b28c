//! Remote resource client contract
//!
//! [`ResourceClient`] is the only way the lifecycle manager and the deletion
//! orchestrator talk to the clinical-data store. [`HttpResourceClient`]
//! implements it over the FHIR REST API; tests substitute in-memory fakes.
//!
//! [`HttpResourceClient`]: super::http::HttpResourceClient

use crate::domain::{Bundle, FhirError, PatientId, ResourceId, ResourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of a remote store call
pub type FhirResult<T> = std::result::Result<T, FhirError>;

/// One JSON Patch (RFC 6902) operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// JSON Patch operation kinds used by Carelink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
}

impl PatchOperation {
    /// `add` sets the member whether or not it already exists
    pub fn set(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }
}

/// Search parameters, kept in insertion order
///
/// ```
/// use carelink::adapters::fhir::SearchParams;
///
/// let params = SearchParams::new()
///     .with("patient", "Patient/p-1")
///     .with("status", "active")
///     .sort_desc("date")
///     .count(1);
/// assert_eq!(params.to_query_string(), "patient=Patient%2Fp-1&status=active&_sort=-date&_count=1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pairs: Vec<(String, String)>,
}

impl SearchParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `name=value` parameter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// Sorts by `field`, newest first
    pub fn sort_desc(self, field: &str) -> Self {
        self.with("_sort", format!("-{field}"))
    }

    /// Caps the page size
    pub fn count(self, n: usize) -> Self {
        self.with("_count", n.to_string())
    }

    /// Asks only for the match total, no entries
    pub fn summary_count(self) -> Self {
        self.with("_summary", "count")
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Value of the first parameter named `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Form-encoded query string
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}

/// Create/read/update/patch/delete/search against a remote FHIR store
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Reads one resource; a missing resource is [`FhirError::NotFound`]
    async fn get(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<Value>;

    /// Creates a resource, returning the stored payload with its new `id`
    async fn create(&self, resource_type: &ResourceType, payload: Value) -> FhirResult<Value>;

    /// Replaces a resource
    async fn update(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        payload: Value,
    ) -> FhirResult<Value>;

    /// Applies a JSON Patch, touching only the listed paths
    async fn patch(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        operations: &[PatchOperation],
    ) -> FhirResult<Value>;

    /// Deletes a resource
    async fn delete(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<()>;

    /// Runs a type-level search, returning the first page
    async fn search(&self, resource_type: &ResourceType, params: &SearchParams)
        -> FhirResult<Bundle>;

    /// Reads the whole patient compartment (`Patient/{id}/$everything`)
    ///
    /// Paged results are concatenated into one Bundle.
    async fn patient_everything(&self, patient_id: &PatientId) -> FhirResult<Bundle>;

    /// Base URL of the store, for diagnostics
    fn base_url(&self) -> &str;
}
