//! # Attendance Tracker Backend
//!
//! Geofence-driven attendance engine: organization-scoped geofence
//! definitions, point-in-circle membership evaluation, an attendance state
//! machine fed by location pings, and an append-only event ledger with
//! derived lateness and duration metrics.
//!
//! The HTTP layer, authentication, and notification delivery live outside
//! this crate and talk to it through the services, commands, and ports
//! exposed here. Every call carries a [`domain::TenantContext`]; all data
//! is partitioned by organization.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub mod domain;
pub mod storage;

pub use domain::{
    AttendanceNotifier, AttendanceService, GeofenceService, LedgerService, LogNotifier,
    MembershipService, TenantContext,
};
pub use storage::csv::CsvConnection;

/// Main backend struct that orchestrates all services
pub struct Backend {
    pub geofence_service: GeofenceService,
    pub membership_service: MembershipService,
    pub attendance_service: AttendanceService,
    pub ledger_service: LedgerService<CsvConnection>,
}

impl Backend {
    /// Create a backend instance rooted at the given data directory
    pub fn new(data_directory: impl AsRef<Path>) -> Result<Self> {
        Self::build(data_directory, None)
    }

    /// Create a backend instance that delivers events through `notifier`
    pub fn with_notifier(
        data_directory: impl AsRef<Path>,
        notifier: Arc<dyn AttendanceNotifier>,
    ) -> Result<Self> {
        Self::build(data_directory, Some(notifier))
    }

    fn build(
        data_directory: impl AsRef<Path>,
        notifier: Option<Arc<dyn AttendanceNotifier>>,
    ) -> Result<Self> {
        let connection = Arc::new(CsvConnection::new(data_directory)?);

        let geofence_service = GeofenceService::new(connection.clone());
        let membership_service = MembershipService::new(geofence_service.clone());
        let ledger_service = LedgerService::new(connection.clone());
        let attendance_service = match notifier {
            Some(notifier) => AttendanceService::with_notifier(
                connection,
                geofence_service.clone(),
                membership_service.clone(),
                ledger_service.clone(),
                notifier,
            ),
            None => AttendanceService::new(
                connection,
                geofence_service.clone(),
                membership_service.clone(),
                ledger_service.clone(),
            ),
        };

        Ok(Backend {
            geofence_service,
            membership_service,
            attendance_service,
            ledger_service,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::commands::attendance::LocationPingCommand;
    use crate::domain::commands::geofence::{AssignEmployeeCommand, CreateGeofenceCommand};
    use crate::domain::geo::Coordinate;
    use crate::domain::models::attendance::AttendanceStatus;
    use crate::domain::models::geofence::{GeofenceSchedule, GeofenceSettings};

    #[test]
    fn test_backend_wires_a_working_pipeline() {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = Backend::new(temp_dir.path()).unwrap();
        let ctx = TenantContext::organization("org-a");
        let center = Coordinate::new(37.4419, -122.1430);

        let geofence = backend
            .geofence_service
            .create_geofence(
                &ctx,
                CreateGeofenceCommand {
                    organization_id: "org-a".to_string(),
                    name: "Main office".to_string(),
                    center,
                    radius_meters: 100.0,
                    schedule: GeofenceSchedule::disabled(),
                    settings: GeofenceSettings::default(),
                },
            )
            .unwrap()
            .geofence;
        backend
            .geofence_service
            .assign_employee(
                &ctx,
                AssignEmployeeCommand {
                    organization_id: "org-a".to_string(),
                    geofence_id: geofence.id,
                    employee_id: "emp-1".to_string(),
                },
            )
            .unwrap();

        let result = backend
            .attendance_service
            .handle_location_update(
                &ctx,
                LocationPingCommand {
                    organization_id: "org-a".to_string(),
                    employee_id: "emp-1".to_string(),
                    location: center,
                    timestamp: "2025-06-02T09:00:00Z".parse().unwrap(),
                },
            )
            .unwrap();

        assert_eq!(result.state.current_status, AttendanceStatus::CheckedIn);
        assert_eq!(result.events.len(), 1);
    }

    #[test]
    fn test_backend_state_survives_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let ctx = TenantContext::organization("org-a");
        let center = Coordinate::new(37.4419, -122.1430);

        {
            let backend = Backend::new(temp_dir.path()).unwrap();
            let geofence = backend
                .geofence_service
                .create_geofence(
                    &ctx,
                    CreateGeofenceCommand {
                        organization_id: "org-a".to_string(),
                        name: "Main office".to_string(),
                        center,
                        radius_meters: 100.0,
                        schedule: GeofenceSchedule::disabled(),
                        settings: GeofenceSettings::default(),
                    },
                )
                .unwrap()
                .geofence;
            backend
                .geofence_service
                .assign_employee(
                    &ctx,
                    AssignEmployeeCommand {
                        organization_id: "org-a".to_string(),
                        geofence_id: geofence.id,
                        employee_id: "emp-1".to_string(),
                    },
                )
                .unwrap();
            backend
                .attendance_service
                .handle_location_update(
                    &ctx,
                    LocationPingCommand {
                        organization_id: "org-a".to_string(),
                        employee_id: "emp-1".to_string(),
                        location: center,
                        timestamp: "2025-06-02T09:00:00Z".parse().unwrap(),
                    },
                )
                .unwrap();
        }

        let reopened = Backend::new(temp_dir.path()).unwrap();
        let state = reopened
            .attendance_service
            .current_state(&ctx, "org-a", "emp-1")
            .unwrap();
        assert_eq!(state.current_status, AttendanceStatus::CheckedIn);
    }
}
