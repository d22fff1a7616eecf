//! Tenant scoping for every registry and ledger access.
//!
//! All attendance data is partitioned by organization. A `TenantContext`
//! travels with each service call and is resolved into a `TenantScope`
//! before any storage access; that resolution is the single tenancy check
//! in the system, and `organization_id` is the one canonical tenant key.

use crate::domain::models::errors::AttendanceError;

/// Who is calling: a member of exactly one organization, or a platform
/// operator who may address any organization explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantContext {
    Organization(String),
    Platform,
}

impl TenantContext {
    pub fn organization(id: impl Into<String>) -> Self {
        TenantContext::Organization(id.into())
    }

    pub fn is_platform(&self) -> bool {
        matches!(self, TenantContext::Platform)
    }

    /// Resolve the effective organization for an operation.
    ///
    /// Organization callers may only act on their own organization; naming
    /// any other is a `TenancyViolation`. Every per-organization operation
    /// must name an organization - a missing one is a
    /// `MissingTenantContext`, a bug in the calling layer.
    pub fn scope(&self, organization_id: Option<&str>) -> Result<TenantScope, AttendanceError> {
        let requested = match organization_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(AttendanceError::MissingTenantContext),
        };
        match self {
            TenantContext::Organization(own) if own != requested => {
                Err(AttendanceError::TenancyViolation {
                    resource: format!("organization {}", requested),
                })
            }
            _ => Ok(TenantScope {
                organization_id: requested.to_string(),
            }),
        }
    }
}

/// A resolved, single-organization scope.
///
/// Construction goes through [`TenantContext::scope`]; repositories receive
/// the already-resolved organization id and never see the caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    organization_id: String,
}

impl TenantScope {
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
}
