//! Access guard contract
//!
//! The guard resolves who is calling and whether they hold a permission.
//! Session and token mechanics live outside this crate; the lifecycle
//! manager only sees [`AccessGuard`]. [`StaticAccessGuard`] grants
//! permissions from the `[access]` configuration table and backs the CLI.

use crate::config::AccessConfig;
use crate::domain::{CarelinkError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Permission checked before an operation proceeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    StartEpisode,
    UpgradeEpisode,
    EndEpisode,
    ReadEpisode,
    StartEncounter,
    EndEncounter,
    DeletePatient,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::StartEpisode,
        Permission::UpgradeEpisode,
        Permission::EndEpisode,
        Permission::ReadEpisode,
        Permission::StartEncounter,
        Permission::EndEncounter,
        Permission::DeletePatient,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::StartEpisode => "start_episode",
            Permission::UpgradeEpisode => "upgrade_episode",
            Permission::EndEpisode => "end_episode",
            Permission::ReadEpisode => "read_episode",
            Permission::StartEncounter => "start_encounter",
            Permission::EndEncounter => "end_encounter",
            Permission::DeletePatient => "delete_patient",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("Unknown permission '{s}'"))
    }
}

/// Per-request context handed down from the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated subject, if the outer layer established one
    pub subject: Option<String>,
}

impl RequestContext {
    pub fn for_subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Resolved caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    pub subject: String,
}

/// Resolves callers and checks permissions
#[async_trait]
pub trait AccessGuard: Send + Sync {
    /// Resolves the caller from the request context
    async fn current_caller(&self, ctx: &RequestContext) -> Result<Caller>;

    /// Whether `caller` holds `permission`
    async fn is_authorized(&self, caller: &Caller, permission: Permission) -> bool;
}

/// Resolves the caller and fails with [`CarelinkError::Authorization`]
/// unless they hold `permission`
pub async fn authorize(
    guard: &dyn AccessGuard,
    ctx: &RequestContext,
    permission: Permission,
) -> Result<Caller> {
    let caller = guard.current_caller(ctx).await?;
    if !guard.is_authorized(&caller, permission).await {
        tracing::warn!(
            subject = %caller.subject,
            permission = %permission,
            "Permission denied"
        );
        return Err(CarelinkError::Authorization(format!(
            "{} is not permitted to {}",
            caller.subject, permission
        )));
    }
    Ok(caller)
}

/// Grant table loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGuard {
    grants: HashMap<String, HashSet<Permission>>,
}

impl StaticAccessGuard {
    /// Builds the guard from `[access]`; `*` expands to every permission
    ///
    /// # Errors
    ///
    /// Returns [`CarelinkError::Configuration`] for unknown permission names.
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        let mut grants: HashMap<String, HashSet<Permission>> = HashMap::new();
        for grant in &config.grants {
            let entry = grants.entry(grant.subject.clone()).or_default();
            for name in &grant.permissions {
                if name == "*" {
                    entry.extend(Permission::ALL);
                } else {
                    entry.insert(name.parse().map_err(CarelinkError::Configuration)?);
                }
            }
        }
        Ok(Self { grants })
    }

    /// Grants `permissions` to `subject`
    pub fn grant(mut self, subject: impl Into<String>, permissions: &[Permission]) -> Self {
        self.grants
            .entry(subject.into())
            .or_default()
            .extend(permissions.iter().copied());
        self
    }
}

#[async_trait]
impl AccessGuard for StaticAccessGuard {
    async fn current_caller(&self, ctx: &RequestContext) -> Result<Caller> {
        match ctx.subject.as_deref() {
            Some(subject) if !subject.trim().is_empty() => Ok(Caller {
                subject: subject.to_string(),
            }),
            _ => Err(CarelinkError::Authorization(
                "request carries no caller identity".to_string(),
            )),
        }
    }

    async fn is_authorized(&self, caller: &Caller, permission: Permission) -> bool {
        self.grants
            .get(&caller.subject)
            .map(|set| set.contains(&permission))
            .unwrap_or(false)
    }
}
