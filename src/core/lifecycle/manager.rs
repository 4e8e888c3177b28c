//! Episode lifecycle manager
//!
//! Sequences episode and encounter state transitions:
//!
//! ```text
//! EpisodeOfCare   absent --start_episode_by_otp--> active[PROFILE_AND_RECENT_VISITS | FULL]
//!                 active[PROFILE_AND_RECENT_VISITS] --upgrade_episode--> active[FULL]
//!                 active --end_episode--> finished
//! Encounter       absent --start_encounter--> in-progress --end_encounter--> finished
//! ```
//!
//! Every operation checks the caller's permission before touching the
//! store, and every remote call is awaited before the next one starts.

use super::period::{closed_period, opening_period, Clock, SystemClock};
use crate::adapters::access::{authorize, AccessGuard, Permission, RequestContext};
use crate::adapters::fhir::{PatchOperation, ResourceClient, SearchParams};
use crate::adapters::organization::OrganizationResolver;
use crate::adapters::otp::OtpVerifier;
use crate::config::LifecycleConfig;
use crate::domain::{
    AccessLevel, CarelinkError, Encounter, EncounterId, EncounterStatus, EpisodeId,
    EpisodeOfCare, EpisodeStatus, FhirResource, OrganizationId, PatientId, ResourceId,
    ResourceRef, ResourceType, Result,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Page size used when listing an episode's open encounters
const OPEN_ENCOUNTER_PAGE_SIZE: usize = 500;

/// Input to [`EpisodeLifecycleManager::start_episode_by_otp`]
#[derive(Debug, Clone)]
pub struct StartEpisodeRequest {
    pub patient_id: PatientId,
    pub provider_code: String,
    pub phone_number: String,
    pub otp: String,
    pub full_access: bool,
}

/// Input to [`EpisodeLifecycleManager::upgrade_episode`]
#[derive(Debug, Clone)]
pub struct UpgradeEpisodeRequest {
    pub episode_id: EpisodeId,
    pub phone_number: String,
    pub otp: String,
}

/// Episode returned by a start, with the patient's visit count
#[derive(Debug, Clone, PartialEq)]
pub struct StartedEpisode {
    pub episode: EpisodeOfCare,
    /// Number of Encounters recorded for the patient
    pub visit_count: u64,
    /// `false` when an existing active episode was reused
    pub created: bool,
}

/// Result of closing an episode
#[derive(Debug, Clone, PartialEq)]
pub struct EndedEpisode {
    pub episode: EpisodeOfCare,
    /// Encounters that were closed along with the episode
    pub encounters_closed: Vec<EncounterId>,
    /// Encounters whose close failed, with the error message
    pub encounter_failures: Vec<(EncounterId, String)>,
}

/// Per-key async locks for serialising episode starts
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn lock_for(&self, key: String) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(key).or_default().clone()
    }
}

/// Orchestrates episode and encounter transitions against the remote store
pub struct EpisodeLifecycleManager {
    client: Arc<dyn ResourceClient>,
    guard: Arc<dyn AccessGuard>,
    otp: Arc<dyn OtpVerifier>,
    organizations: Arc<dyn OrganizationResolver>,
    clock: Arc<dyn Clock>,
    config: LifecycleConfig,
    start_locks: KeyedLocks,
}

impl EpisodeLifecycleManager {
    /// Creates a manager using the system clock
    pub fn new(
        client: Arc<dyn ResourceClient>,
        guard: Arc<dyn AccessGuard>,
        otp: Arc<dyn OtpVerifier>,
        organizations: Arc<dyn OrganizationResolver>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            client,
            guard,
            otp,
            organizations,
            clock: Arc::new(SystemClock),
            config,
            start_locks: KeyedLocks::default(),
        }
    }

    /// Replaces the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens an episode after OTP verification, or returns the active one
    ///
    /// An active episode for the same patient and organization is returned
    /// unchanged. Within one process, concurrent starts for the same pair
    /// are serialised; separate processes can still race between the
    /// search and the create.
    ///
    /// # Errors
    ///
    /// - [`CarelinkError::Authorization`] without `start_episode`
    /// - [`CarelinkError::Verification`] if the OTP does not verify
    /// - [`CarelinkError::Remote`] for store or organization failures
    pub async fn start_episode_by_otp(
        &self,
        ctx: &RequestContext,
        request: StartEpisodeRequest,
    ) -> Result<StartedEpisode> {
        const OP: &str = "start_episode";

        let caller = authorize(self.guard.as_ref(), ctx, Permission::StartEpisode).await?;
        self.verify_otp(&request.phone_number, &request.otp).await?;

        let organization_id = self
            .organizations
            .get_or_create(&request.provider_code)
            .await
            .map_err(|e| e.in_operation(OP, "Organization"))?;

        let lock = self
            .start_locks
            .lock_for(format!("{}|{}", request.patient_id, organization_id));
        let _serialised = if self.config.serialize_episode_starts {
            Some(lock.lock_owned().await)
        } else {
            None
        };

        if let Some(existing) = self
            .find_active_episode(&request.patient_id, &organization_id)
            .await?
        {
            let visit_count = self.count_visits(&request.patient_id).await?;
            tracing::info!(
                episode_id = ?existing.id,
                patient_id = %request.patient_id,
                organization_id = %organization_id,
                "Reusing active episode"
            );
            return Ok(StartedEpisode {
                episode: existing,
                visit_count,
                created: false,
            });
        }

        let access = AccessLevel::from_full_access(request.full_access);
        let period = opening_period(self.clock.now(), self.config.episode_horizon_hours)?;
        let draft =
            EpisodeOfCare::new_active(&request.patient_id, &organization_id, access, period);

        let stored = self
            .client
            .create(&ResourceType::EpisodeOfCare, draft.to_payload()?)
            .await
            .map_err(|e| CarelinkError::remote(OP, "EpisodeOfCare", e))?;
        let episode = EpisodeOfCare::from_payload(stored)?;
        let episode_id = episode.require_id()?.clone();

        crate::log_transition!("EpisodeOfCare", episode_id, "absent", "active");
        tracing::info!(
            episode_id = %episode_id,
            subject = %caller.subject,
            access = %access,
            "Episode started"
        );

        let visit_count = self.count_visits(&request.patient_id).await?;
        Ok(StartedEpisode {
            episode,
            visit_count,
            created: true,
        })
    }

    /// Raises an active episode to full access after OTP re-verification
    ///
    /// The episode lookup is filtered to `status=active` and must match
    /// exactly one resource. An episode already at full access is returned
    /// as-is, without verifying the OTP or patching.
    pub async fn upgrade_episode(
        &self,
        ctx: &RequestContext,
        request: UpgradeEpisodeRequest,
    ) -> Result<EpisodeOfCare> {
        const OP: &str = "upgrade_episode";

        authorize(self.guard.as_ref(), ctx, Permission::UpgradeEpisode).await?;

        let params = SearchParams::new()
            .with("_id", request.episode_id.as_str())
            .with("status", EpisodeStatus::Active.as_str());
        let matches = self
            .client
            .search(&ResourceType::EpisodeOfCare, &params)
            .await
            .map_err(|e| CarelinkError::remote(OP, "EpisodeOfCare", e))?
            .resources();

        let mut episode = match <[Value; 1]>::try_from(matches) {
            Ok([only]) => EpisodeOfCare::from_payload(only)?,
            Err(found) => {
                return Err(CarelinkError::Precondition(format!(
                    "expected exactly one active EpisodeOfCare/{}, found {}",
                    request.episode_id,
                    found.len()
                )))
            }
        };

        if episode.access_level() == AccessLevel::Full {
            tracing::debug!(episode_id = %request.episode_id, "Episode already has full access");
            return Ok(episode);
        }

        self.verify_otp(&request.phone_number, &request.otp).await?;

        episode.set_access_level(AccessLevel::Full);
        let patch = [PatchOperation::set(
            "/type",
            serde_json::to_value(&episode.types)?,
        )];
        let patched = self
            .client
            .patch(
                &ResourceType::EpisodeOfCare,
                &resource_id(request.episode_id.as_str())?,
                &patch,
            )
            .await
            .map_err(|e| CarelinkError::remote(OP, "EpisodeOfCare", e))?;

        tracing::info!(
            episode_id = %request.episode_id,
            from = %AccessLevel::ProfileAndRecentVisits,
            to = %AccessLevel::Full,
            "Episode access upgraded"
        );
        decode_or(patched, episode)
    }

    /// Closes an episode and every encounter still open under it
    ///
    /// Encounter closes that fail are logged and reported in
    /// [`EndedEpisode::encounter_failures`]; they never stop the episode
    /// from closing.
    pub async fn end_episode(
        &self,
        ctx: &RequestContext,
        episode_id: &EpisodeId,
    ) -> Result<EndedEpisode> {
        const OP: &str = "end_episode";

        authorize(self.guard.as_ref(), ctx, Permission::EndEpisode).await?;
        let now = self.clock.now();

        let episode = self.fetch_episode(OP, episode_id).await?;
        if !episode.is_active() {
            return Err(CarelinkError::Precondition(format!(
                "EpisodeOfCare/{episode_id} is {}, only an active episode can be ended",
                episode.status
            )));
        }

        let open = self.open_encounter_payloads(OP, episode_id).await?;
        let mut encounters_closed = Vec::with_capacity(open.len());
        let mut encounter_failures = Vec::new();

        for payload in open {
            let encounter_id = match payload
                .get("id")
                .and_then(Value::as_str)
                .map(EncounterId::new)
            {
                Some(Ok(id)) => id,
                _ => {
                    tracing::warn!(episode_id = %episode_id, "Skipping encounter without a usable id");
                    continue;
                }
            };
            let closed = match Encounter::from_payload(payload) {
                Ok(encounter) => self.close_encounter(OP, encounter, now).await,
                Err(e) => Err(e),
            };
            match closed {
                Ok(_) => encounters_closed.push(encounter_id),
                Err(e) => {
                    tracing::warn!(
                        episode_id = %episode_id,
                        encounter_id = %encounter_id,
                        error = %e,
                        "Failed to end encounter, continuing with episode close"
                    );
                    encounter_failures.push((encounter_id, e.to_string()));
                }
            }
        }

        let period = closed_period(&episode.period, now);
        let patch = [
            PatchOperation::set("/status", json!(EpisodeStatus::Finished.as_str())),
            PatchOperation::set("/period", serde_json::to_value(&period)?),
        ];
        let patched = self
            .client
            .patch(
                &ResourceType::EpisodeOfCare,
                &resource_id(episode_id.as_str())?,
                &patch,
            )
            .await
            .map_err(|e| CarelinkError::remote(OP, "EpisodeOfCare", e))?;

        let mut local = episode;
        local.status = EpisodeStatus::Finished;
        local.period = period;
        let episode = decode_or(patched, local)?;

        crate::log_transition!("EpisodeOfCare", episode_id, "active", "finished");
        tracing::info!(
            episode_id = %episode_id,
            encounters_closed = encounters_closed.len(),
            encounter_failures = encounter_failures.len(),
            "Episode ended"
        );

        Ok(EndedEpisode {
            episode,
            encounters_closed,
            encounter_failures,
        })
    }

    /// Starts an ambulatory encounter under an active episode
    ///
    /// # Errors
    ///
    /// [`CarelinkError::Precondition`] if the episode is not `active`; no
    /// encounter is created in that case.
    pub async fn start_encounter(
        &self,
        ctx: &RequestContext,
        episode_id: &EpisodeId,
    ) -> Result<Encounter> {
        const OP: &str = "start_encounter";

        authorize(self.guard.as_ref(), ctx, Permission::StartEncounter).await?;

        let episode = self.fetch_episode(OP, episode_id).await?;
        if episode.status != EpisodeStatus::Active {
            return Err(CarelinkError::Precondition(
                "an encounter can only be started for an active episode".to_string(),
            ));
        }

        let draft = Encounter::start_for(&episode, self.clock.now())?;
        let stored = self
            .client
            .create(&ResourceType::Encounter, draft.to_payload()?)
            .await
            .map_err(|e| CarelinkError::remote(OP, "Encounter", e))?;
        let encounter = Encounter::from_payload(stored)?;

        crate::log_transition!("Encounter", encounter.require_id()?, "absent", "in-progress");
        Ok(encounter)
    }

    /// Finishes an encounter, writing `now + 24h` as its period end
    pub async fn end_encounter(
        &self,
        ctx: &RequestContext,
        encounter_id: &EncounterId,
    ) -> Result<Encounter> {
        const OP: &str = "end_encounter";

        authorize(self.guard.as_ref(), ctx, Permission::EndEncounter).await?;
        let now = self.clock.now();

        let payload = self
            .client
            .get(&ResourceType::Encounter, &resource_id(encounter_id.as_str())?)
            .await
            .map_err(|e| CarelinkError::remote(OP, "Encounter", e))?;
        let encounter = Encounter::from_payload(payload)?;

        self.close_encounter(OP, encounter, now).await
    }

    /// Reads one episode
    pub async fn get_episode(
        &self,
        ctx: &RequestContext,
        episode_id: &EpisodeId,
    ) -> Result<EpisodeOfCare> {
        authorize(self.guard.as_ref(), ctx, Permission::ReadEpisode).await?;
        self.fetch_episode("get_episode", episode_id).await
    }

    /// Lists encounters still in progress under an episode
    pub async fn list_open_encounters(
        &self,
        ctx: &RequestContext,
        episode_id: &EpisodeId,
    ) -> Result<Vec<Encounter>> {
        authorize(self.guard.as_ref(), ctx, Permission::ReadEpisode).await?;
        self.open_encounter_payloads("list_open_encounters", episode_id)
            .await?
            .into_iter()
            .map(Encounter::from_payload)
            .collect()
    }

    /// Number of Encounters recorded for a patient
    ///
    /// Falls back to counting returned entries when the store omits `total`.
    pub async fn count_visits(&self, patient_id: &PatientId) -> Result<u64> {
        let params = SearchParams::new()
            .with("patient", ResourceRef::from(patient_id).to_reference())
            .summary_count();
        let bundle = self
            .client
            .search(&ResourceType::Encounter, &params)
            .await
            .map_err(|e| CarelinkError::remote("count_visits", "Encounter", e))?;
        Ok(bundle
            .total
            .unwrap_or_else(|| bundle.resources().len() as u64))
    }

    async fn verify_otp(&self, phone_number: &str, code: &str) -> Result<String> {
        let outcome = self.otp.verify(phone_number, code).await.map_err(|e| {
            tracing::warn!(error = %e, "OTP verifier rejected phone number");
            CarelinkError::Verification(format!("invalid phone: {e}"))
        })?;
        if !outcome.verified {
            tracing::warn!(phone = %outcome.normalized_phone, "OTP did not verify");
            return Err(CarelinkError::Verification("invalid OTP".to_string()));
        }
        Ok(outcome.normalized_phone)
    }

    async fn find_active_episode(
        &self,
        patient_id: &PatientId,
        organization_id: &OrganizationId,
    ) -> Result<Option<EpisodeOfCare>> {
        let params = SearchParams::new()
            .with("patient", ResourceRef::from(patient_id).to_reference())
            .with("status", EpisodeStatus::Active.as_str())
            .with(
                "organization",
                ResourceRef::from(organization_id).to_reference(),
            )
            .sort_desc("date")
            .count(1);
        let bundle = self
            .client
            .search(&ResourceType::EpisodeOfCare, &params)
            .await
            .map_err(|e| CarelinkError::remote("find_active_episode", "EpisodeOfCare", e))?;

        bundle
            .resources()
            .into_iter()
            .next()
            .map(EpisodeOfCare::from_payload)
            .transpose()
    }

    async fn fetch_episode(
        &self,
        operation: &'static str,
        episode_id: &EpisodeId,
    ) -> Result<EpisodeOfCare> {
        let payload = self
            .client
            .get(&ResourceType::EpisodeOfCare, &resource_id(episode_id.as_str())?)
            .await
            .map_err(|e| CarelinkError::remote(operation, "EpisodeOfCare", e))?;
        EpisodeOfCare::from_payload(payload)
    }

    /// Raw payloads of in-progress encounters, decoded by the caller
    async fn open_encounter_payloads(
        &self,
        operation: &'static str,
        episode_id: &EpisodeId,
    ) -> Result<Vec<Value>> {
        let params = SearchParams::new()
            .with("episode-of-care", ResourceRef::from(episode_id).to_reference())
            .with("status", EncounterStatus::InProgress.as_str())
            .count(OPEN_ENCOUNTER_PAGE_SIZE);
        let bundle = self
            .client
            .search(&ResourceType::Encounter, &params)
            .await
            .map_err(|e| CarelinkError::remote(operation, "Encounter", e))?;

        Ok(bundle.resources())
    }

    /// Patches status and period only
    async fn close_encounter(
        &self,
        operation: &'static str,
        encounter: Encounter,
        now: DateTime<Utc>,
    ) -> Result<Encounter> {
        let encounter_id = encounter.require_id()?.clone();
        let period = closed_period(&encounter.period, now);
        let patch = [
            PatchOperation::set("/status", json!(EncounterStatus::Finished.as_str())),
            PatchOperation::set("/period", serde_json::to_value(&period)?),
        ];
        let patched = self
            .client
            .patch(
                &ResourceType::Encounter,
                &resource_id(encounter_id.as_str())?,
                &patch,
            )
            .await
            .map_err(|e| CarelinkError::remote(operation, "Encounter", e))?;

        let mut local = encounter;
        local.status = EncounterStatus::Finished;
        local.period = period;

        crate::log_transition!("Encounter", encounter_id, "in-progress", "finished");
        decode_or(patched, local)
    }
}

fn resource_id(id: &str) -> Result<ResourceId> {
    ResourceId::new(id).map_err(CarelinkError::Validation)
}

/// Decodes a write response, or keeps `local` if the store returned no body
fn decode_or<R: FhirResource>(payload: Value, local: R) -> Result<R> {
    if payload.is_null() {
        Ok(local)
    } else {
        R::from_payload(payload)
    }
}
