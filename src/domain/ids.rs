//! Domain identifier types with validation
//!
//! Newtype wrappers for FHIR logical IDs, plus [`ResourceType`] and
//! [`ResourceRef`], the `(type, id)` pair used for cross-resource pointers
//! and deletion ordering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! logical_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", $label, " ID, rejecting blank input")]
            pub fn new(id: impl Into<String>) -> Result<Self, String> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(concat!($label, " ID cannot be empty").to_string());
                }
                if id.contains('/') {
                    return Err(format!(concat!($label, " ID cannot contain '/': {}"), id));
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes self and returns the inner String
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

logical_id!(
    /// Patient logical ID
    ///
    /// ```
    /// use carelink::domain::ids::PatientId;
    ///
    /// let id = PatientId::new("p-123").unwrap();
    /// assert_eq!(id.as_str(), "p-123");
    /// assert!(PatientId::new("  ").is_err());
    /// ```
    PatientId,
    "Patient"
);
logical_id!(
    /// EpisodeOfCare logical ID, assigned by the remote store on creation
    EpisodeId,
    "EpisodeOfCare"
);
logical_id!(
    /// Encounter logical ID
    EncounterId,
    "Encounter"
);
logical_id!(
    /// Organization logical ID
    OrganizationId,
    "Organization"
);
logical_id!(
    /// Logical ID of a resource of any type
    ResourceId,
    "Resource"
);

/// FHIR resource type
///
/// The types the lifecycle and deletion code reason about are named;
/// everything else is carried verbatim in [`ResourceType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Patient,
    EpisodeOfCare,
    Encounter,
    Observation,
    MedicationRequest,
    Condition,
    Organization,
    Other(String),
}

impl ResourceType {
    /// Wire name of the resource type
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::EpisodeOfCare => "EpisodeOfCare",
            ResourceType::Encounter => "Encounter",
            ResourceType::Observation => "Observation",
            ResourceType::MedicationRequest => "MedicationRequest",
            ResourceType::Condition => "Condition",
            ResourceType::Organization => "Organization",
            ResourceType::Other(name) => name,
        }
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        match name {
            "Patient" => ResourceType::Patient,
            "EpisodeOfCare" => ResourceType::EpisodeOfCare,
            "Encounter" => ResourceType::Encounter,
            "Observation" => ResourceType::Observation,
            "MedicationRequest" => ResourceType::MedicationRequest,
            "Condition" => ResourceType::Condition,
            "Organization" => ResourceType::Organization,
            other => ResourceType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(resource type, id)` pair, rendered as `Type/id`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub id: ResourceId,
}

impl ResourceRef {
    /// Creates a reference from a type and an ID
    pub fn new(resource_type: ResourceType, id: ResourceId) -> Self {
        Self { resource_type, id }
    }

    /// Parses a relative reference such as `Patient/123`
    ///
    /// Absolute URLs and version suffixes (`/_history/n`) are tolerated;
    /// only the trailing `Type/id` pair is kept.
    pub fn parse(reference: &str) -> Result<Self, String> {
        let trimmed = match reference.find("/_history/") {
            Some(idx) => &reference[..idx],
            None => reference,
        };
        let mut parts = trimmed.rsplitn(2, '/');
        let id = parts.next().unwrap_or_default();
        let type_part = parts
            .next()
            .ok_or_else(|| format!("Reference '{reference}' is not of the form Type/id"))?;
        let type_name = type_part.rsplit('/').next().unwrap_or(type_part);
        if type_name.is_empty() {
            return Err(format!("Reference '{reference}' has no resource type"));
        }
        Ok(Self {
            resource_type: ResourceType::from(type_name),
            id: ResourceId::new(id)?,
        })
    }

    /// Relative reference string (`Type/id`)
    pub fn to_reference(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id)
    }
}

impl From<&PatientId> for ResourceRef {
    fn from(id: &PatientId) -> Self {
        ResourceRef::new(ResourceType::Patient, ResourceId(id.0.clone()))
    }
}

impl From<&EpisodeId> for ResourceRef {
    fn from(id: &EpisodeId) -> Self {
        ResourceRef::new(ResourceType::EpisodeOfCare, ResourceId(id.0.clone()))
    }
}

impl From<&EncounterId> for ResourceRef {
    fn from(id: &EncounterId) -> Self {
        ResourceRef::new(ResourceType::Encounter, ResourceId(id.0.clone()))
    }
}

impl From<&OrganizationId> for ResourceRef {
    fn from(id: &OrganizationId) -> Self {
        ResourceRef::new(ResourceType::Organization, ResourceId(id.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_reject_blank_and_slash() {
        assert!(EpisodeId::new("").is_err());
        assert!(EncounterId::new("   ").is_err());
        assert!(PatientId::new("Patient/1").is_err());
        assert!(OrganizationId::new("org-1").is_ok());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = PatientId::new("p-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"p-1\"");
    }

    #[test]
    fn test_resource_type_round_trip_for_unknown() {
        let rt = ResourceType::from("ServiceRequest");
        assert_eq!(rt, ResourceType::Other("ServiceRequest".to_string()));
        assert_eq!(rt.as_str(), "ServiceRequest");
        assert_eq!(ResourceType::from("Encounter"), ResourceType::Encounter);
    }

    #[test]
    fn test_reference_parse_relative() {
        let r = ResourceRef::parse("EpisodeOfCare/ep-9").unwrap();
        assert_eq!(r.resource_type, ResourceType::EpisodeOfCare);
        assert_eq!(r.id.as_str(), "ep-9");
        assert_eq!(r.to_reference(), "EpisodeOfCare/ep-9");
    }

    #[test]
    fn test_reference_parse_absolute_and_versioned() {
        let r =
            ResourceRef::parse("https://fhir.example.com/r4/Patient/p-1/_history/3").unwrap();
        assert_eq!(r.resource_type, ResourceType::Patient);
        assert_eq!(r.id.as_str(), "p-1");
    }

    #[test]
    fn test_reference_parse_rejects_bare_id() {
        assert!(ResourceRef::parse("p-1").is_err());
        assert!(ResourceRef::parse("Patient/").is_err());
    }

    #[test]
    fn test_typed_id_into_ref() {
        let ep = EpisodeId::new("ep-1").unwrap();
        assert_eq!(ResourceRef::from(&ep).to_string(), "EpisodeOfCare/ep-1");
    }
}
