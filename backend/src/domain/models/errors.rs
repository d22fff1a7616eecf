use thiserror::Error;

/// Typed errors surfaced by the attendance engine.
///
/// Services return `anyhow::Result`; callers that need to branch on a kind
/// downcast with `err.downcast_ref::<AttendanceError>()`.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Latitude/longitude out of WGS-84 range or non-finite. Not retryable.
    #[error("invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A caller tried to reach data outside its own organization.
    #[error("cross-organization access denied: {resource}")]
    TenancyViolation { resource: String },

    /// A per-organization operation arrived with no organization resolved.
    /// Programmer error in the calling layer.
    #[error("tenant context is required for this operation")]
    MissingTenantContext,

    /// A referenced record does not exist within the caller's scope.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A state-machine rule was violated, e.g. check-out without a matching
    /// check-in.
    #[error("invalid attendance transition: {reason}")]
    InvalidTransition { reason: String },

    /// The conditional state update lost a race and the retry failed too.
    /// Transient; the caller may retry the whole operation.
    #[error("concurrent modification of attendance state for employee {employee_id}")]
    ConcurrentModification { employee_id: String },
}
