//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::models::attendance::{
    AttendanceEvent, AttendanceStatus, EmployeeAttendanceState,
};
use crate::domain::models::geofence::GeofenceDefinition;

/// Trait defining the interface for geofence definition storage.
///
/// All lookups are per-organization; the tenancy guard resolves the
/// organization id before any of these are called.
pub trait GeofenceStorage: Send + Sync {
    /// Store a new geofence definition
    fn store_geofence(&self, geofence: &GeofenceDefinition) -> Result<()>;

    /// Retrieve a specific geofence by ID within one organization
    fn get_geofence(
        &self,
        organization_id: &str,
        geofence_id: &str,
    ) -> Result<Option<GeofenceDefinition>>;

    /// List all geofences of one organization
    fn list_geofences(&self, organization_id: &str) -> Result<Vec<GeofenceDefinition>>;

    /// Replace an existing geofence definition
    fn update_geofence(&self, geofence: &GeofenceDefinition) -> Result<()>;
}

/// Trait defining the interface for the append-only attendance ledger.
///
/// The ledger is append-only by contract: no update or delete operation is
/// exposed here or anywhere above this trait.
pub trait AttendanceEventStorage: Send + Sync {
    /// Append a single event
    fn append_event(&self, event: &AttendanceEvent) -> Result<()>;

    /// List events of one organization, optionally restricted to one
    /// employee and an inclusive time range, ordered by timestamp ascending
    fn list_events(
        &self,
        organization_id: &str,
        employee_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceEvent>>;

    /// Whether an event id is already taken within the organization
    fn event_id_exists(&self, organization_id: &str, event_id: &str) -> Result<bool>;
}

/// Trait defining the interface for per-employee attendance state.
pub trait EmployeeStateStorage: Send + Sync {
    /// Retrieve the current state of one employee
    fn get_state(
        &self,
        organization_id: &str,
        employee_id: &str,
    ) -> Result<Option<EmployeeAttendanceState>>;

    /// Store a state unconditionally (initial seeding)
    fn put_state(&self, state: &EmployeeAttendanceState) -> Result<()>;

    /// Conditional write: persist `state` only if the stored status still
    /// equals `expected`. An employee with no stored row counts as the
    /// initial `CheckedOut` state. Returns false when the condition fails.
    fn update_state_if_status(
        &self,
        expected: AttendanceStatus,
        state: &EmployeeAttendanceState,
    ) -> Result<bool>;
}

/// Trait defining the interface for storage connections
///
/// This trait abstracts away the specific connection type and provides
/// factory methods for creating repositories, so the domain layer can work
/// with any storage backend without knowing the implementation details.
pub trait Connection: Send + Sync + Clone {
    type GeofenceRepository: GeofenceStorage + Clone;
    type EventRepository: AttendanceEventStorage + Clone;
    type StateRepository: EmployeeStateStorage + Clone;

    fn create_geofence_repository(&self) -> Self::GeofenceRepository;
    fn create_event_repository(&self) -> Self::EventRepository;
    fn create_state_repository(&self) -> Self::StateRepository;
}
