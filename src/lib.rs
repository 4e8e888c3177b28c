// Carelink - Episode lifecycle and patient erasure for FHIR servers
// Copyright (c) 2025 Carelink Contributors
// Licensed under the MIT License

//! # Carelink
//!
//! Carelink manages care-episode access against a remote FHIR R4 store and
//! erases a patient's clinical compartment in dependency order.
//!
//! ## Overview
//!
//! - **Episodes**: an EpisodeOfCare grants an organization access to a
//!   patient. It is opened after OTP verification, can be upgraded from
//!   profile-and-recent-visits access to full access, and is closed together
//!   with its open encounters.
//! - **Encounters**: ambulatory visits started and ended inside an active
//!   episode.
//! - **Erasure**: `Patient/{id}/$everything` is read, classified into
//!   buckets and deleted in an order that never leaves a dangling reference.
//!
//! ## Architecture
//!
//! - [`cli`] - Operator command-line interface
//! - [`core`] - Lifecycle manager and deletion orchestrator
//! - [`adapters`] - FHIR client, access guard, OTP and organization contracts
//! - [`domain`] - Identifiers, resources, bundles and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carelink::adapters::access::{RequestContext, StaticAccessGuard};
//! use carelink::adapters::fhir::{HttpResourceClient, ResourceClient};
//! use carelink::adapters::organization::FhirOrganizationResolver;
//! use carelink::adapters::otp::UnavailableOtpVerifier;
//! use carelink::config::load_config;
//! use carelink::core::lifecycle::EpisodeLifecycleManager;
//! use carelink::domain::EpisodeId;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("carelink.toml")?;
//!     let client: Arc<dyn ResourceClient> = Arc::new(HttpResourceClient::new(config.fhir.clone())?);
//!
//!     let manager = EpisodeLifecycleManager::new(
//!         client.clone(),
//!         Arc::new(StaticAccessGuard::from_config(&config.access)?),
//!         Arc::new(UnavailableOtpVerifier),
//!         Arc::new(FhirOrganizationResolver::new(client, config.organization.clone())),
//!         config.lifecycle.clone(),
//!     );
//!
//!     let ctx = RequestContext::for_subject("episode-service");
//!     let ended = manager.end_episode(&ctx, &EpisodeId::new("ep-1")?).await?;
//!     println!("closed {} encounters", ended.encounters_closed.len());
//!     Ok(())
//! }
//! ```
//!
//! ## The 24-hour rule
//!
//! Closing an encounter or an episode writes `now + 24h` as the period end,
//! never the wall-clock close time. See [`core::lifecycle::period`].
//!
//! ## Error Handling
//!
//! All library operations return [`domain::Result`], whose error type is
//! [`domain::CarelinkError`]. Remote failures carry the operation name and
//! resource type that produced them.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
