//! In-memory fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use carelink::adapters::access::{Permission, RequestContext, StaticAccessGuard};
use carelink::adapters::fhir::{FhirResult, PatchOp, PatchOperation, ResourceClient, SearchParams};
use carelink::adapters::otp::{OtpVerification, OtpVerifier};
use carelink::domain::{
    Bundle, CarelinkError, FhirError, PatientId, ResourceId, ResourceType, Result,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CLINICIAN: &str = "clinician";

/// One recorded call, rendered as `METHOD Type[/id][?query]`
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(String),
    Create(String),
    Update(String),
    Patch(String, Vec<PatchOperation>),
    Delete(String),
    Search(String, SearchParams),
    Everything(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::Create(_) | Call::Update(_) | Call::Patch(..) | Call::Delete(_)
        )
    }
}

#[derive(Default)]
struct StoreState {
    resources: BTreeMap<(String, String), Value>,
    next_id: usize,
    calls: Vec<Call>,
    failures: HashMap<String, FhirError>,
    search_overrides: HashMap<String, Vec<Value>>,
    everything: Option<Value>,
}

/// A recording [`ResourceClient`] backed by a map
///
/// Searches understand the handful of parameters Carelink issues.
/// Failures are injected per `"METHOD Type/id"` key, e.g.
/// `"PATCH Encounter/e-2"` or `"DELETE Observation/o-1"`.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: Value) {
        let key = key_of(&resource);
        self.state().resources.insert(key, resource);
    }

    pub fn resource(&self, resource_type: &str, id: &str) -> Option<Value> {
        self.state()
            .resources
            .get(&(resource_type.to_string(), id.to_string()))
            .cloned()
    }

    pub fn count_of(&self, resource_type: &str) -> usize {
        self.state()
            .resources
            .keys()
            .filter(|(t, _)| t == resource_type)
            .count()
    }

    pub fn fail(&self, key: &str, error: FhirError) {
        self.state().failures.insert(key.to_string(), error);
    }

    /// Forces every search on `resource_type` to return `results`
    pub fn override_search(&self, resource_type: &str, results: Vec<Value>) {
        self.state()
            .search_overrides
            .insert(resource_type.to_string(), results);
    }

    pub fn set_everything(&self, bundle: Value) {
        self.state().everything = Some(bundle);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn patches_of(&self, reference: &str) -> Vec<Vec<PatchOperation>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Patch(r, ops) if r == reference => Some(ops),
                _ => None,
            })
            .collect()
    }

    pub fn creates_of(&self, resource_type: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(t) if t == resource_type))
            .count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    fn injected(&self, key: &str) -> FhirResult<()> {
        match self.state().failures.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

fn key_of(resource: &Value) -> (String, String) {
    (
        resource["resourceType"].as_str().unwrap().to_string(),
        resource["id"].as_str().unwrap().to_string(),
    )
}

fn matches_param(resource: &Value, name: &str, value: &str) -> bool {
    match name {
        "_id" => resource["id"] == value,
        "status" => resource["status"] == value,
        "patient" => resource["patient"]["reference"] == value || resource["subject"]["reference"] == value,
        "organization" => resource["managingOrganization"]["reference"] == value,
        "episode-of-care" => resource["episodeOfCare"]
            .as_array()
            .map(|refs| refs.iter().any(|r| r["reference"] == value))
            .unwrap_or(false),
        "identifier" => {
            let (system, code) = value.split_once('|').unwrap_or(("", value));
            resource["identifier"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .any(|i| i["system"] == system && i["value"] == code)
                })
                .unwrap_or(false)
        }
        _ => true,
    }
}

fn searchset(resources: Vec<Value>, total: usize, with_entries: bool) -> Bundle {
    let mut payload = json!({"resourceType": "Bundle", "type": "searchset", "total": total});
    if with_entries {
        payload["entry"] = Value::Array(
            resources
                .into_iter()
                .map(|r| json!({"resource": r}))
                .collect(),
        );
    }
    Bundle::from_payload(payload).unwrap()
}

#[async_trait]
impl ResourceClient for FakeStore {
    async fn get(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<Value> {
        let reference = format!("{resource_type}/{id}");
        self.state().calls.push(Call::Get(reference.clone()));
        self.injected(&format!("GET {reference}"))?;
        self.resource(resource_type.as_str(), id.as_str())
            .ok_or(FhirError::NotFound(reference))
    }

    async fn create(&self, resource_type: &ResourceType, mut payload: Value) -> FhirResult<Value> {
        self.state().calls.push(Call::Create(resource_type.to_string()));
        self.injected(&format!("POST {resource_type}"))?;
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            format!("{}-{}", resource_type.as_str().to_lowercase(), state.next_id)
        };
        payload["id"] = json!(id);
        payload["meta"] = json!({"versionId": "1"});
        self.insert(payload.clone());
        Ok(payload)
    }

    async fn update(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        payload: Value,
    ) -> FhirResult<Value> {
        let reference = format!("{resource_type}/{id}");
        self.state().calls.push(Call::Update(reference.clone()));
        self.injected(&format!("PUT {reference}"))?;
        self.insert(payload.clone());
        Ok(payload)
    }

    async fn patch(
        &self,
        resource_type: &ResourceType,
        id: &ResourceId,
        operations: &[PatchOperation],
    ) -> FhirResult<Value> {
        let reference = format!("{resource_type}/{id}");
        self.state()
            .calls
            .push(Call::Patch(reference.clone(), operations.to_vec()));
        self.injected(&format!("PATCH {reference}"))?;

        let mut resource = self
            .resource(resource_type.as_str(), id.as_str())
            .ok_or_else(|| FhirError::NotFound(reference.clone()))?;
        for op in operations {
            let field = op.path.trim_start_matches('/');
            match op.op {
                PatchOp::Add | PatchOp::Replace => {
                    resource[field] = op.value.clone().unwrap_or(Value::Null);
                }
                PatchOp::Remove => {
                    if let Some(obj) = resource.as_object_mut() {
                        obj.remove(field);
                    }
                }
            }
        }
        self.insert(resource.clone());
        Ok(resource)
    }

    async fn delete(&self, resource_type: &ResourceType, id: &ResourceId) -> FhirResult<()> {
        let reference = format!("{resource_type}/{id}");
        self.state().calls.push(Call::Delete(reference.clone()));
        self.injected(&format!("DELETE {reference}"))?;
        self.state()
            .resources
            .remove(&(resource_type.to_string(), id.to_string()));
        Ok(())
    }

    async fn search(
        &self,
        resource_type: &ResourceType,
        params: &SearchParams,
    ) -> FhirResult<Bundle> {
        self.state()
            .calls
            .push(Call::Search(resource_type.to_string(), params.clone()));
        self.injected(&format!("SEARCH {resource_type}"))?;

        if let Some(results) = self
            .state()
            .search_overrides
            .get(resource_type.as_str())
            .cloned()
        {
            let total = results.len();
            return Ok(searchset(results, total, true));
        }

        let mut found: Vec<Value> = self
            .state()
            .resources
            .iter()
            .filter(|((t, _), _)| t == resource_type.as_str())
            .map(|(_, r)| r.clone())
            .filter(|r| {
                params
                    .pairs()
                    .iter()
                    .all(|(name, value)| matches_param(r, name, value))
            })
            .collect();

        let total = found.len();
        if params.get("_summary") == Some("count") {
            return Ok(searchset(Vec::new(), total, false));
        }
        if let Some(count) = params.get("_count").and_then(|c| c.parse::<usize>().ok()) {
            found.truncate(count);
        }
        Ok(searchset(found, total, true))
    }

    async fn patient_everything(&self, patient_id: &PatientId) -> FhirResult<Bundle> {
        let reference = format!("Patient/{patient_id}");
        self.state().calls.push(Call::Everything(reference.clone()));
        self.injected(&format!("EVERYTHING {reference}"))?;
        let payload = self
            .state()
            .everything
            .clone()
            .unwrap_or_else(|| json!({"resourceType": "Bundle", "type": "searchset"}));
        Bundle::from_payload(payload).map_err(|e| FhirError::InvalidResponse(e.to_string()))
    }

    fn base_url(&self) -> &str {
        "memory://fhir"
    }
}

/// OTP verifier accepting one code, counting calls
pub struct FakeOtp {
    accepted_code: String,
    calls: AtomicUsize,
}

impl FakeOtp {
    pub fn accepting(code: &str) -> Self {
        Self {
            accepted_code: code.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OtpVerifier for FakeOtp {
    async fn verify(&self, phone_number: &str, code: &str) -> Result<OtpVerification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
        if digits.len() < 7 {
            return Err(CarelinkError::Validation(format!(
                "cannot parse phone number '{phone_number}'"
            )));
        }
        Ok(OtpVerification {
            verified: code == self.accepted_code,
            normalized_phone: format!("+{digits}"),
        })
    }
}

/// Guard granting every permission to [`CLINICIAN`]
pub fn permissive_guard() -> StaticAccessGuard {
    StaticAccessGuard::default().grant(CLINICIAN, &Permission::ALL)
}

pub fn clinician() -> RequestContext {
    RequestContext::for_subject(CLINICIAN)
}

pub fn entry(resource_type: &str, id: &str) -> Value {
    json!({"fullUrl": format!("urn:{resource_type}/{id}"), "resource": {"resourceType": resource_type, "id": id}})
}

pub fn everything(entries: Vec<Value>) -> Value {
    json!({"resourceType": "Bundle", "type": "searchset", "entry": entries})
}
