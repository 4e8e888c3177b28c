//! Organization resolution
//!
//! Episodes are managed by the organization identified by a provider code.
//! [`FhirOrganizationResolver`] looks the code up as an Organization
//! identifier and creates the Organization on first use.

use super::fhir::{ResourceClient, SearchParams};
use crate::config::OrganizationConfig;
use crate::domain::{CarelinkError, OrganizationId, ResourceType, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Maps a provider code to the managing organization's ID
#[async_trait]
pub trait OrganizationResolver: Send + Sync {
    /// Returns the organization for `provider_code`, creating it if needed
    async fn get_or_create(&self, provider_code: &str) -> Result<OrganizationId>;
}

/// Resolver backed by Organization resources in the remote store
pub struct FhirOrganizationResolver {
    client: Arc<dyn ResourceClient>,
    config: OrganizationConfig,
}

impl FhirOrganizationResolver {
    pub fn new(client: Arc<dyn ResourceClient>, config: OrganizationConfig) -> Self {
        Self { client, config }
    }

    fn id_from_payload(payload: &Value) -> Result<OrganizationId> {
        payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarelinkError::Serialization("Organization payload has no id".to_string())
            })
            .and_then(|id| OrganizationId::new(id).map_err(CarelinkError::Validation))
    }
}

#[async_trait]
impl OrganizationResolver for FhirOrganizationResolver {
    async fn get_or_create(&self, provider_code: &str) -> Result<OrganizationId> {
        let provider_code = provider_code.trim();
        if provider_code.is_empty() {
            return Err(CarelinkError::Validation(
                "provider code cannot be empty".to_string(),
            ));
        }

        let params = SearchParams::new()
            .with(
                "identifier",
                format!("{}|{}", self.config.identifier_system, provider_code),
            )
            .count(1);
        let bundle = self
            .client
            .search(&ResourceType::Organization, &params)
            .await
            .map_err(|e| CarelinkError::remote("resolve_organization", "Organization", e))?;

        if let Some(existing) = bundle.resources().first() {
            let id = Self::id_from_payload(existing)?;
            tracing::debug!(provider_code = %provider_code, organization_id = %id, "Organization found");
            return Ok(id);
        }

        let payload = json!({
            "resourceType": "Organization",
            "active": true,
            "identifier": [{
                "system": self.config.identifier_system,
                "value": provider_code,
            }],
        });
        let created = self
            .client
            .create(&ResourceType::Organization, payload)
            .await
            .map_err(|e| CarelinkError::remote("create_organization", "Organization", e))?;
        let id = Self::id_from_payload(&created)?;

        tracing::info!(provider_code = %provider_code, organization_id = %id, "Organization created");
        Ok(id)
    }
}
