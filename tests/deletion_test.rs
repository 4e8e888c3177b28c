//! Integration tests for compartment deletion

mod common;

use carelink::adapters::access::RequestContext;
use carelink::core::deletion::{CompartmentDeletionOrchestrator, DeletionBucket};
use carelink::domain::{CarelinkError, FhirError, PatientId};
use common::{clinician, entry, everything, permissive_guard, Call, FakeStore};
use serde_json::json;
use std::sync::Arc;
use test_case::test_case;

fn orchestrator(store: &Arc<FakeStore>) -> CompartmentDeletionOrchestrator {
    CompartmentDeletionOrchestrator::new(store.clone(), Arc::new(permissive_guard()))
}

fn patient() -> PatientId {
    PatientId::new("p-1").unwrap()
}

fn full_compartment() -> serde_json::Value {
    everything(vec![
        entry("Patient", "p-1"),
        entry("EpisodeOfCare", "ep-1"),
        entry("Encounter", "enc-1"),
        entry("Observation", "obs-1"),
        entry("Condition", "cond-1"),
        entry("MedicationRequest", "med-1"),
        entry("Encounter", "enc-2"),
        entry("AllergyIntolerance", "alg-1"),
        entry("MedicationRequest", "med-2"),
    ])
}

#[tokio::test]
async fn test_deletes_in_dependency_order() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(full_compartment());

    let deleted = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap();

    assert!(deleted);
    assert_eq!(
        store.deletes(),
        vec![
            "MedicationRequest/med-1",
            "MedicationRequest/med-2",
            "Condition/cond-1",
            "AllergyIntolerance/alg-1",
            "Encounter/enc-1",
            "Encounter/enc-2",
            "EpisodeOfCare/ep-1",
            "Observation/obs-1",
            "Patient/p-1",
        ]
    );
}

#[tokio::test]
async fn test_everything_is_read_once_before_any_delete() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(full_compartment());

    orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap();

    let calls = store.calls();
    assert_eq!(calls[0], Call::Everything("Patient/p-1".to_string()));
    assert_eq!(
        calls
            .iter()
            .filter(|c| matches!(c, Call::Everything(_)))
            .count(),
        1
    );
}

#[test_case(json!({"resourceType": "Bundle", "type": "searchset"}) ; "no entry field")]
#[test_case(json!({"resourceType": "Bundle", "type": "searchset", "entry": []}) ; "empty entry array")]
#[tokio::test]
async fn test_empty_compartment_returns_false(bundle: serde_json::Value) {
    let store = Arc::new(FakeStore::new());
    store.set_everything(bundle);

    let deleted = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap();

    assert!(!deleted);
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_first_failure_aborts_remaining_buckets() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(full_compartment());
    store.fail(
        "DELETE Encounter/enc-1",
        FhirError::Conflict("referenced by Observation/obs-1".to_string()),
    );

    let err = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap_err();

    match &err {
        CarelinkError::Remote {
            operation,
            resource_type,
            source,
        } => {
            assert_eq!(*operation, "delete_patient_compartment");
            assert_eq!(resource_type, "Encounter");
            assert!(matches!(source, FhirError::Conflict(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let deletes = store.deletes();
    assert_eq!(deletes.last().map(String::as_str), Some("Encounter/enc-1"));
    assert!(!deletes.iter().any(|d| d.starts_with("Encounter/enc-2")));
    assert!(!deletes.iter().any(|d| d.starts_with("EpisodeOfCare/")));
    assert!(!deletes.iter().any(|d| d.starts_with("Observation/")));
    assert!(!deletes.iter().any(|d| d.starts_with("Patient/")));
}

#[tokio::test]
async fn test_malformed_entry_deletes_nothing() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(everything(vec![
        entry("Patient", "p-1"),
        json!({"resource": {"resourceType": "Observation"}}),
    ]));

    let err = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap_err();

    assert!(matches!(err, CarelinkError::MalformedCompartment(_)));
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_everything_failure_is_wrapped() {
    let store = Arc::new(FakeStore::new());
    store.fail(
        "EVERYTHING Patient/p-1",
        FhirError::NotFound("Patient/p-1".to_string()),
    );

    let err = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap_err();

    assert!(matches!(err.fhir_error(), Some(FhirError::NotFound(_))));
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_unauthorized_caller_cannot_delete() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(full_compartment());

    let err = orchestrator(&store)
        .delete_patient_compartment(&RequestContext::anonymous(), &patient())
        .await
        .unwrap_err();

    assert!(matches!(err, CarelinkError::Authorization(_)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_plan_previews_without_deleting() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(full_compartment());

    let plan = orchestrator(&store)
        .plan(&clinician(), &patient())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(plan.len(), 9);
    assert_eq!(plan.bucket(DeletionBucket::Assorted).len(), 2);
    assert_eq!(plan.bucket(DeletionBucket::Patient).len(), 1);
    assert!(store.deletes().is_empty());
}

#[tokio::test]
async fn test_compartment_without_patient_still_completes() {
    let store = Arc::new(FakeStore::new());
    store.set_everything(everything(vec![entry("Observation", "obs-1")]));

    let deleted = orchestrator(&store)
        .delete_patient_compartment(&clinician(), &patient())
        .await
        .unwrap();

    assert!(deleted);
    assert_eq!(store.deletes(), vec!["Observation/obs-1"]);
}
