//! Typed clinical resources and their JSON codec
//!
//! Only the fields the lifecycle manager reads or writes are modelled.
//! Unknown fields returned by the store are ignored on decode.

use super::errors::CarelinkError;
use super::ids::{EncounterId, EpisodeId, OrganizationId, PatientId, ResourceRef, ResourceType};
use super::result::Result;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Coding system carrying the episode access classification
pub const ACCESS_LEVEL_SYSTEM: &str = "urn:carelink:episode-access";

/// HL7 v3 ActCode system used for the encounter class
pub const ACT_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";

/// Ambulatory encounter class code
pub const AMBULATORY_CODE: &str = "AMB";

/// A resource that can be encoded to and decoded from a store payload
pub trait FhirResource: Serialize + DeserializeOwned {
    /// Resource type this struct maps to
    const RESOURCE_TYPE: ResourceType;

    /// Encodes the resource into the JSON payload the store expects
    fn to_payload(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes a store payload, checking its `resourceType`
    fn from_payload(payload: Value) -> Result<Self> {
        let declared = payload
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if declared != Self::RESOURCE_TYPE.as_str() {
            return Err(CarelinkError::Serialization(format!(
                "Expected resourceType {}, got '{declared}'",
                Self::RESOURCE_TYPE
            )));
        }
        serde_json::from_value(payload).map_err(|e| {
            CarelinkError::Serialization(format!(
                "Failed to decode {}: {e}",
                Self::RESOURCE_TYPE
            ))
        })
    }
}

/// FHIR Reference (only the literal `reference` is used)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    /// Parses the literal reference into a `(type, id)` pair
    pub fn target(&self) -> Result<ResourceRef> {
        ResourceRef::parse(&self.reference).map_err(CarelinkError::Validation)
    }
}

impl From<&ResourceRef> for Reference {
    fn from(r: &ResourceRef) -> Self {
        Reference {
            reference: r.to_reference(),
        }
    }
}

impl From<ResourceRef> for Reference {
    fn from(r: ResourceRef) -> Self {
        Reference::from(&r)
    }
}

/// FHIR Coding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// FHIR CodeableConcept
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
}

/// FHIR `dateTime`, kept exactly as written on the wire
///
/// Accepts the partial forms `YYYY`, `YYYY-MM` and `YYYY-MM-DD` as well as
/// full timestamps with a zone. Values Carelink writes itself are always
/// full UTC timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FhirDateTime(String);

/// `YYYY`, `YYYY-MM`, `YYYY-MM-DD` or an RFC 3339 timestamp
fn is_fhir_date_time(s: &str) -> bool {
    match s.len() {
        4 => s.bytes().all(|b| b.is_ascii_digit()),
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok(),
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
        _ => s.contains('T') && DateTime::parse_from_rfc3339(s).is_ok(),
    }
}

impl FhirDateTime {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The instant this value names, if it is a full timestamp
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.0)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl FromStr for FhirDateTime {
    type Err = CarelinkError;

    fn from_str(s: &str) -> Result<Self> {
        if is_fhir_date_time(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(CarelinkError::Validation(format!("invalid FHIR dateTime '{s}'")))
        }
    }
}

impl TryFrom<String> for FhirDateTime {
    type Error = CarelinkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FhirDateTime> for String {
    fn from(value: FhirDateTime) -> Self {
        value.0
    }
}

impl From<DateTime<Utc>> for FhirDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// FHIR Period
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Period {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<FhirDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<FhirDateTime>,
}

/// Access granted to the holder of an episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    ProfileAndRecentVisits,
    Full,
}

impl AccessLevel {
    /// Derives the level from the `fullAccess` request flag
    pub fn from_full_access(full_access: bool) -> Self {
        if full_access {
            AccessLevel::Full
        } else {
            AccessLevel::ProfileAndRecentVisits
        }
    }

    /// Code written to the episode's `type` coding
    pub fn code(&self) -> &'static str {
        match self {
            AccessLevel::ProfileAndRecentVisits => "PROFILE_AND_RECENT_VISITS_ACCESS",
            AccessLevel::Full => "FULL_ACCESS",
        }
    }

    /// The concept stored in `EpisodeOfCare.type`
    pub fn to_concept(&self) -> CodeableConcept {
        CodeableConcept {
            coding: vec![Coding {
                system: Some(ACCESS_LEVEL_SYSTEM.to_string()),
                code: Some(self.code().to_string()),
                display: None,
            }],
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PROFILE_AND_RECENT_VISITS_ACCESS" => Ok(AccessLevel::ProfileAndRecentVisits),
            "FULL_ACCESS" => Ok(AccessLevel::Full),
            other => Err(format!("Unknown access level '{other}'")),
        }
    }
}

/// EpisodeOfCare.status value set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EpisodeStatus {
    Planned,
    Waitlist,
    Active,
    Onhold,
    Finished,
    Cancelled,
    EnteredInError,
}

impl EpisodeStatus {
    /// Wire value of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            EpisodeStatus::Planned => "planned",
            EpisodeStatus::Waitlist => "waitlist",
            EpisodeStatus::Active => "active",
            EpisodeStatus::Onhold => "onhold",
            EpisodeStatus::Finished => "finished",
            EpisodeStatus::Cancelled => "cancelled",
            EpisodeStatus::EnteredInError => "entered-in-error",
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encounter.status value set (FHIR R4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncounterStatus {
    Planned,
    Arrived,
    Triaged,
    InProgress,
    Onleave,
    Finished,
    Cancelled,
    EnteredInError,
    Unknown,
}

impl EncounterStatus {
    /// Wire value of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            EncounterStatus::Planned => "planned",
            EncounterStatus::Arrived => "arrived",
            EncounterStatus::Triaged => "triaged",
            EncounterStatus::InProgress => "in-progress",
            EncounterStatus::Onleave => "onleave",
            EncounterStatus::Finished => "finished",
            EncounterStatus::Cancelled => "cancelled",
            EncounterStatus::EnteredInError => "entered-in-error",
            EncounterStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EncounterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn episode_of_care_tag() -> String {
    "EpisodeOfCare".to_string()
}

fn encounter_tag() -> String {
    "Encounter".to_string()
}

/// An access-granted relationship between a patient and an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeOfCare {
    #[serde(default = "episode_of_care_tag")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EpisodeId>,
    pub status: EpisodeStatus,
    #[serde(default, rename = "type", skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<CodeableConcept>,
    pub patient: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managing_organization: Option<Reference>,
    #[serde(default)]
    pub period: Period,
}

impl FhirResource for EpisodeOfCare {
    const RESOURCE_TYPE: ResourceType = ResourceType::EpisodeOfCare;
}

impl EpisodeOfCare {
    /// Composes a new active episode, not yet persisted
    pub fn new_active(
        patient: &PatientId,
        organization: &OrganizationId,
        access: AccessLevel,
        period: Period,
    ) -> Self {
        Self {
            resource_type: episode_of_care_tag(),
            id: None,
            status: EpisodeStatus::Active,
            types: vec![access.to_concept()],
            patient: Reference::from(ResourceRef::from(patient)),
            managing_organization: Some(Reference::from(ResourceRef::from(organization))),
            period,
        }
    }

    /// Store-assigned ID; errors for an unsaved episode
    pub fn require_id(&self) -> Result<&EpisodeId> {
        self.id.as_ref().ok_or_else(|| {
            CarelinkError::Serialization("EpisodeOfCare payload has no id".to_string())
        })
    }

    /// Access classification carried in `type`
    ///
    /// Episodes written before classification existed default to the
    /// restricted level.
    pub fn access_level(&self) -> AccessLevel {
        self.types
            .iter()
            .flat_map(|concept| concept.coding.iter())
            .filter(|coding| coding.system.as_deref() == Some(ACCESS_LEVEL_SYSTEM))
            .find_map(|coding| coding.code.as_deref().and_then(|c| c.parse().ok()))
            .unwrap_or(AccessLevel::ProfileAndRecentVisits)
    }

    /// Replaces the access classification, keeping unrelated `type` entries
    pub fn set_access_level(&mut self, access: AccessLevel) {
        self.types.retain(|concept| {
            !concept
                .coding
                .iter()
                .any(|c| c.system.as_deref() == Some(ACCESS_LEVEL_SYSTEM))
        });
        self.types.push(access.to_concept());
    }

    /// Patient the episode belongs to
    pub fn patient_ref(&self) -> Result<ResourceRef> {
        self.patient.target()
    }

    pub fn is_active(&self) -> bool {
        self.status == EpisodeStatus::Active
    }
}

/// One clinical visit nested inside an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    #[serde(default = "encounter_tag")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EncounterId>,
    pub status: EncounterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub episode_of_care: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<Reference>,
    #[serde(default)]
    pub period: Period,
}

impl FhirResource for Encounter {
    const RESOURCE_TYPE: ResourceType = ResourceType::Encounter;
}

impl Encounter {
    /// Builds an in-progress ambulatory encounter under `episode`
    ///
    /// Subject and service provider are copied from the episode.
    pub fn start_for(episode: &EpisodeOfCare, started_at: DateTime<Utc>) -> Result<Self> {
        let episode_id = episode.require_id()?;
        let patient = episode.patient_ref()?;
        if patient.resource_type != ResourceType::Patient {
            return Err(CarelinkError::Validation(format!(
                "EpisodeOfCare/{episode_id} points at {patient}, not a Patient"
            )));
        }
        Ok(Self {
            resource_type: encounter_tag(),
            id: None,
            status: EncounterStatus::InProgress,
            class: Some(Coding {
                system: Some(ACT_CODE_SYSTEM.to_string()),
                code: Some(AMBULATORY_CODE.to_string()),
                display: Some("ambulatory".to_string()),
            }),
            subject: Some(episode.patient.clone()),
            episode_of_care: vec![Reference::from(ResourceRef::from(episode_id))],
            service_provider: episode.managing_organization.clone(),
            period: Period {
                start: Some(started_at.into()),
                end: None,
            },
        })
    }

    pub fn require_id(&self) -> Result<&EncounterId> {
        self.id.as_ref().ok_or_else(|| {
            CarelinkError::Serialization("Encounter payload has no id".to_string())
        })
    }
}
