//! Deletion plan for a patient compartment
//!
//! Compartment entries are sorted into buckets that are drained in a fixed
//! order, so a resource is never deleted while something still in the
//! store references it.

use crate::domain::{Bundle, CompartmentResource, ResourceRef, Result};
use std::fmt;

/// A group of compartment resources deleted together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionBucket {
    MedicationRequests,
    /// Every resource type without a bucket of its own
    Assorted,
    Encounters,
    EpisodesOfCare,
    Observations,
    Patient,
}

impl DeletionBucket {
    /// Drain order
    pub const ORDER: [DeletionBucket; 6] = [
        DeletionBucket::MedicationRequests,
        DeletionBucket::Assorted,
        DeletionBucket::Encounters,
        DeletionBucket::EpisodesOfCare,
        DeletionBucket::Observations,
        DeletionBucket::Patient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionBucket::MedicationRequests => "medication_requests",
            DeletionBucket::Assorted => "assorted",
            DeletionBucket::Encounters => "encounters",
            DeletionBucket::EpisodesOfCare => "episodes_of_care",
            DeletionBucket::Observations => "observations",
            DeletionBucket::Patient => "patient",
        }
    }

    fn of(resource: &CompartmentResource) -> Self {
        match resource {
            CompartmentResource::MedicationRequest(_) => DeletionBucket::MedicationRequests,
            CompartmentResource::Other { .. } => DeletionBucket::Assorted,
            CompartmentResource::Encounter(_) => DeletionBucket::Encounters,
            CompartmentResource::EpisodeOfCare(_) => DeletionBucket::EpisodesOfCare,
            CompartmentResource::Observation(_) => DeletionBucket::Observations,
            CompartmentResource::Patient(_) => DeletionBucket::Patient,
        }
    }

    fn index(&self) -> usize {
        match self {
            DeletionBucket::MedicationRequests => 0,
            DeletionBucket::Assorted => 1,
            DeletionBucket::Encounters => 2,
            DeletionBucket::EpisodesOfCare => 3,
            DeletionBucket::Observations => 4,
            DeletionBucket::Patient => 5,
        }
    }
}

impl fmt::Display for DeletionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compartment resources grouped by bucket, each in bundle order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    buckets: [Vec<ResourceRef>; 6],
}

impl DeletionPlan {
    /// Builds a plan from a `$everything` bundle
    ///
    /// Returns `Ok(None)` when the bundle carries no entries.
    ///
    /// # Errors
    ///
    /// [`crate::domain::CarelinkError::MalformedCompartment`] if any entry
    /// lacks a resource object, a `resourceType` or an `id`. Nothing is
    /// planned in that case.
    pub fn from_bundle(bundle: &Bundle) -> Result<Option<Self>> {
        let entries = match bundle.entry.as_deref() {
            Some(entries) if !entries.is_empty() => entries,
            _ => return Ok(None),
        };

        let mut plan = DeletionPlan::default();
        for entry in entries {
            plan.push(CompartmentResource::from_entry(entry)?);
        }
        Ok(Some(plan))
    }

    fn push(&mut self, resource: CompartmentResource) {
        let bucket = DeletionBucket::of(&resource);
        self.buckets[bucket.index()].push(resource.reference());
    }

    /// Resources in one bucket
    pub fn bucket(&self, bucket: DeletionBucket) -> &[ResourceRef] {
        &self.buckets[bucket.index()]
    }

    /// Buckets in drain order, with their contents
    pub fn buckets(&self) -> impl Iterator<Item = (DeletionBucket, &[ResourceRef])> {
        DeletionBucket::ORDER
            .into_iter()
            .map(move |bucket| (bucket, self.bucket(bucket)))
    }

    /// Every resource in the order it will be deleted
    pub fn ordered(&self) -> impl Iterator<Item = &ResourceRef> {
        self.buckets().flat_map(|(_, refs)| refs.iter())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CarelinkError, ResourceType};
    use serde_json::{json, Value};

    fn entry(resource_type: &str, id: &str) -> Value {
        json!({"resource": {"resourceType": resource_type, "id": id}})
    }

    fn bundle(entries: Vec<Value>) -> Bundle {
        Bundle::from_payload(json!({"resourceType": "Bundle", "entry": entries})).unwrap()
    }

    #[test]
    fn test_missing_entry_is_no_plan() {
        let bundle = Bundle::from_payload(json!({"resourceType": "Bundle"})).unwrap();
        assert!(DeletionPlan::from_bundle(&bundle).unwrap().is_none());
    }

    #[test]
    fn test_empty_entry_is_no_plan() {
        assert!(DeletionPlan::from_bundle(&bundle(vec![])).unwrap().is_none());
    }

    #[test]
    fn test_resources_land_in_their_buckets() {
        let plan = DeletionPlan::from_bundle(&bundle(vec![
            entry("Patient", "p1"),
            entry("Condition", "c1"),
            entry("Observation", "o1"),
            entry("MedicationRequest", "m1"),
            entry("AllergyIntolerance", "a1"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(plan.len(), 5);
        assert_eq!(plan.bucket(DeletionBucket::Patient).len(), 1);
        assert_eq!(plan.bucket(DeletionBucket::Observations).len(), 1);
        assert_eq!(plan.bucket(DeletionBucket::MedicationRequests).len(), 1);

        let assorted: Vec<String> = plan
            .bucket(DeletionBucket::Assorted)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(assorted, vec!["Condition/c1", "AllergyIntolerance/a1"]);
    }

    #[test]
    fn test_ordered_follows_bucket_order() {
        let plan = DeletionPlan::from_bundle(&bundle(vec![
            entry("Patient", "p1"),
            entry("Observation", "o1"),
            entry("EpisodeOfCare", "e1"),
            entry("Encounter", "enc1"),
            entry("Condition", "c1"),
            entry("MedicationRequest", "m1"),
        ]))
        .unwrap()
        .unwrap();

        let types: Vec<ResourceType> = plan
            .ordered()
            .map(|r| r.resource_type.clone())
            .collect();
        assert_eq!(
            types,
            vec![
                ResourceType::MedicationRequest,
                ResourceType::Condition,
                ResourceType::Encounter,
                ResourceType::EpisodeOfCare,
                ResourceType::Observation,
                ResourceType::Patient,
            ]
        );
    }

    #[test]
    fn test_malformed_entry_rejects_whole_bundle() {
        let result = DeletionPlan::from_bundle(&bundle(vec![
            entry("Patient", "p1"),
            json!({"fullUrl": "urn:uuid:1"}),
        ]));
        assert!(matches!(result, Err(CarelinkError::MalformedCompartment(_))));
    }

    #[test]
    fn test_bucket_names() {
        let names: Vec<&str> = DeletionBucket::ORDER.iter().map(|b| b.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "medication_requests",
                "assorted",
                "encounters",
                "episodes_of_care",
                "observations",
                "patient"
            ]
        );
    }
}
