//! FHIR Bundle decoding
//!
//! Search results and the patient `$everything` compartment both arrive as
//! Bundles. Compartment entries are decoded into [`CompartmentResource`],
//! a tagged variant per resource type the deletion order cares about.

use super::errors::CarelinkError;
use super::ids::{ResourceId, ResourceRef, ResourceType};
use super::result::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A FHIR Bundle as returned by search and `$everything`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link: Vec<BundleLink>,

    /// `None` when the store omitted the field altogether
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<Vec<Value>>,
}

/// Paging link of a Bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

impl Bundle {
    /// Parses a raw Bundle payload
    pub fn from_payload(payload: Value) -> Result<Self> {
        match payload.get("resourceType").and_then(Value::as_str) {
            Some("Bundle") => {}
            other => {
                return Err(CarelinkError::Serialization(format!(
                    "Expected a Bundle, got resourceType {other:?}"
                )))
            }
        }
        serde_json::from_value(payload)
            .map_err(|e| CarelinkError::Serialization(format!("Failed to decode Bundle: {e}")))
    }

    /// URL of the next page, if the store paginated the result
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }

    /// Whether the `entry` field was present at all
    pub fn has_entries(&self) -> bool {
        self.entry.is_some()
    }

    /// The `resource` of every entry, skipping entries without one
    ///
    /// Use this for search results, where `include`/`outcome` entries may
    /// legitimately lack a resource.
    pub fn resources(&self) -> Vec<Value> {
        self.entry
            .iter()
            .flatten()
            .filter_map(|e| e.get("resource").cloned())
            .collect()
    }

    /// Appends another page's entries
    pub fn extend(&mut self, page: Bundle) {
        if let Some(entries) = page.entry {
            self.entry.get_or_insert_with(Vec::new).extend(entries);
        }
        self.link = page.link;
    }
}

/// A resource found inside a patient compartment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompartmentResource {
    Patient(ResourceId),
    EpisodeOfCare(ResourceId),
    Encounter(ResourceId),
    Observation(ResourceId),
    MedicationRequest(ResourceId),
    /// Any other type; deleted with the assorted bucket
    Other {
        resource_type: String,
        id: ResourceId,
    },
}

impl CompartmentResource {
    /// Decodes one Bundle entry
    ///
    /// The entry must carry a `resource` object with a string
    /// `resourceType` and a non-empty `id`.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        let resource = entry
            .get("resource")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                CarelinkError::MalformedCompartment(
                    "bundle entry has no resource object".to_string(),
                )
            })?;
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarelinkError::MalformedCompartment("resource has no resourceType".to_string())
            })?;
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CarelinkError::MalformedCompartment(format!("{resource_type} resource has no id"))
            })
            .and_then(|id| {
                ResourceId::new(id).map_err(|e| {
                    CarelinkError::MalformedCompartment(format!("{resource_type}: {e}"))
                })
            })?;

        Ok(match ResourceType::from(resource_type) {
            ResourceType::Patient => CompartmentResource::Patient(id),
            ResourceType::EpisodeOfCare => CompartmentResource::EpisodeOfCare(id),
            ResourceType::Encounter => CompartmentResource::Encounter(id),
            ResourceType::Observation => CompartmentResource::Observation(id),
            ResourceType::MedicationRequest => CompartmentResource::MedicationRequest(id),
            other => CompartmentResource::Other {
                resource_type: other.as_str().to_string(),
                id,
            },
        })
    }

    /// The `(type, id)` pair used to issue the delete
    pub fn reference(&self) -> ResourceRef {
        match self {
            CompartmentResource::Patient(id) => ResourceRef::new(ResourceType::Patient, id.clone()),
            CompartmentResource::EpisodeOfCare(id) => {
                ResourceRef::new(ResourceType::EpisodeOfCare, id.clone())
            }
            CompartmentResource::Encounter(id) => {
                ResourceRef::new(ResourceType::Encounter, id.clone())
            }
            CompartmentResource::Observation(id) => {
                ResourceRef::new(ResourceType::Observation, id.clone())
            }
            CompartmentResource::MedicationRequest(id) => {
                ResourceRef::new(ResourceType::MedicationRequest, id.clone())
            }
            CompartmentResource::Other { resource_type, id } => {
                ResourceRef::new(ResourceType::from(resource_type.as_str()), id.clone())
            }
        }
    }
}
