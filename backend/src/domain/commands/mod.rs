//! Command and result types consumed by the domain services.

pub mod attendance;
pub mod geofence;
