//! End episode command implementation
//!
//! This module implements the `end-episode` command, which closes an
//! active episode and its open encounters.

use super::build_runtime;
use crate::adapters::access::RequestContext;
use crate::adapters::fhir::ResourceClient;
use crate::adapters::organization::FhirOrganizationResolver;
use crate::adapters::otp::UnavailableOtpVerifier;
use crate::core::lifecycle::EpisodeLifecycleManager;
use crate::domain::EpisodeId;
use clap::Args;
use std::sync::Arc;

/// Arguments for the end-episode command
#[derive(Args, Debug)]
pub struct EndEpisodeArgs {
    /// Logical ID of the EpisodeOfCare resource
    pub episode_id: String,
}

impl EndEpisodeArgs {
    /// Execute the end-episode command
    pub async fn execute(&self, config_path: &str, subject: &str) -> anyhow::Result<i32> {
        let episode_id = match EpisodeId::new(&self.episode_id) {
            Ok(id) => id,
            Err(e) => {
                println!("❌ Invalid episode ID: {e}");
                return Ok(2);
            }
        };

        let runtime = match build_runtime(config_path) {
            Ok(r) => r,
            Err(code) => return Ok(code),
        };

        let client: Arc<dyn ResourceClient> = runtime.client;
        let organizations = Arc::new(FhirOrganizationResolver::new(
            client.clone(),
            runtime.config.organization.clone(),
        ));
        let manager = EpisodeLifecycleManager::new(
            client,
            runtime.guard,
            Arc::new(UnavailableOtpVerifier),
            organizations,
            runtime.config.lifecycle.clone(),
        );

        let ctx = RequestContext::for_subject(subject);
        match manager.end_episode(&ctx, &episode_id).await {
            Ok(ended) => {
                println!("✅ EpisodeOfCare/{episode_id} finished");
                if let Some(end) = &ended.episode.period.end {
                    println!("   Period end: {end}");
                }
                println!("   Encounters closed: {}", ended.encounters_closed.len());
                for (encounter_id, error) in &ended.encounter_failures {
                    println!("   ⚠️  Encounter/{encounter_id} could not be closed: {error}");
                }
                Ok(0)
            }
            Err(e) => {
                crate::log_error_with_context!(&e, format!("Ending EpisodeOfCare/{episode_id}"));
                println!("❌ Failed to end episode");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}
