//! Compartment deletion orchestrator
//!
//! Reads a patient's compartment with `$everything`, plans the deletes and
//! issues them one at a time in bucket order. The first failing delete
//! stops the run; resources already deleted stay deleted.

use super::plan::{DeletionBucket, DeletionPlan};
use crate::adapters::access::{authorize, AccessGuard, Permission, RequestContext};
use crate::adapters::fhir::ResourceClient;
use crate::domain::{CarelinkError, PatientId, Result};
use std::sync::Arc;

const OPERATION: &str = "delete_patient_compartment";

/// Deletes everything in a patient's compartment, the patient last
pub struct CompartmentDeletionOrchestrator {
    client: Arc<dyn ResourceClient>,
    guard: Arc<dyn AccessGuard>,
}

impl CompartmentDeletionOrchestrator {
    pub fn new(client: Arc<dyn ResourceClient>, guard: Arc<dyn AccessGuard>) -> Self {
        Self { client, guard }
    }

    /// Deletes the compartment of `patient_id`
    ///
    /// Returns `Ok(false)` when the compartment has no entries and
    /// `Ok(true)` once every planned delete has succeeded.
    ///
    /// # Errors
    ///
    /// - [`CarelinkError::Authorization`] without `delete_patient`
    /// - [`CarelinkError::MalformedCompartment`] if an entry cannot be
    ///   classified; nothing is deleted
    /// - [`CarelinkError::Remote`] for the `$everything` read or the first
    ///   failing delete
    pub async fn delete_patient_compartment(
        &self,
        ctx: &RequestContext,
        patient_id: &PatientId,
    ) -> Result<bool> {
        let caller = authorize(self.guard.as_ref(), ctx, Permission::DeletePatient).await?;

        let Some(plan) = self.fetch_plan(patient_id).await? else {
            tracing::info!(patient_id = %patient_id, "Patient compartment is empty, nothing to delete");
            return Ok(false);
        };

        tracing::info!(
            patient_id = %patient_id,
            subject = %caller.subject,
            resources = plan.len(),
            "Deleting patient compartment"
        );
        self.execute(patient_id, &plan).await?;
        Ok(true)
    }

    /// Builds the deletion plan without deleting anything
    ///
    /// Requires the same permission as the delete itself.
    pub async fn plan(
        &self,
        ctx: &RequestContext,
        patient_id: &PatientId,
    ) -> Result<Option<DeletionPlan>> {
        authorize(self.guard.as_ref(), ctx, Permission::DeletePatient).await?;
        self.fetch_plan(patient_id).await
    }

    async fn fetch_plan(&self, patient_id: &PatientId) -> Result<Option<DeletionPlan>> {
        let bundle = self
            .client
            .patient_everything(patient_id)
            .await
            .map_err(|e| CarelinkError::remote(OPERATION, "Patient", e))?;
        DeletionPlan::from_bundle(&bundle)
    }

    async fn execute(&self, patient_id: &PatientId, plan: &DeletionPlan) -> Result<()> {
        for (bucket, refs) in plan.buckets() {
            if refs.is_empty() {
                continue;
            }
            tracing::info!(
                patient_id = %patient_id,
                bucket = %bucket,
                count = refs.len(),
                "Deleting bucket"
            );
            for reference in refs {
                tracing::debug!(reference = %reference, "Deleting resource");
                self.client
                    .delete(&reference.resource_type, &reference.id)
                    .await
                    .map_err(|e| {
                        tracing::error!(
                            patient_id = %patient_id,
                            bucket = %bucket,
                            reference = %reference,
                            error = %e,
                            "Delete failed, aborting compartment deletion"
                        );
                        CarelinkError::remote(OPERATION, reference.resource_type.as_str(), e)
                    })?;
            }
        }

        let patients = plan.bucket(DeletionBucket::Patient).len();
        if patients != 1 {
            tracing::warn!(
                patient_id = %patient_id,
                patient_entries = patients,
                "Compartment did not contain exactly one Patient resource"
            );
        }
        tracing::info!(patient_id = %patient_id, deleted = plan.len(), "Patient compartment deleted");
        Ok(())
    }
}
