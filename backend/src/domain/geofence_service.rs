//! Geofence registry: organization-scoped definitions and proximity lookup.

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::commands::geofence::{
    AssignEmployeeCommand, CreateGeofenceCommand, CreateGeofenceResult, RemoveEmployeeCommand,
    UpdateGeofenceStatusCommand,
};
use crate::domain::geo::{self, Coordinate};
use crate::domain::models::errors::AttendanceError;
use crate::domain::models::geofence::{
    GeofenceDefinition, GeofenceStatus, MAX_GRACE_PERIOD_MINUTES, MAX_RADIUS_METERS,
    MIN_RADIUS_METERS,
};
use crate::domain::tenancy::TenantContext;
use crate::storage::csv::{CsvConnection, GeofenceRepository};
use crate::storage::traits::GeofenceStorage;

/// Service for managing geofence definitions
#[derive(Clone)]
pub struct GeofenceService {
    geofence_repository: GeofenceRepository,
}

impl GeofenceService {
    pub fn new(csv_conn: Arc<CsvConnection>) -> Self {
        let geofence_repository = GeofenceRepository::new((*csv_conn).clone());
        Self {
            geofence_repository,
        }
    }

    /// Create a new geofence
    pub fn create_geofence(
        &self,
        ctx: &TenantContext,
        command: CreateGeofenceCommand,
    ) -> Result<CreateGeofenceResult> {
        let scope = ctx.scope(Some(&command.organization_id))?;
        self.validate_create_command(&command)?;

        let now = Utc::now();
        let geofence = GeofenceDefinition {
            id: GeofenceDefinition::generate_id(now.timestamp_millis() as u64),
            organization_id: scope.organization_id().to_string(),
            name: command.name.trim().to_string(),
            center: command.center,
            radius_meters: command.radius_meters,
            schedule: command.schedule,
            settings: command.settings,
            status: GeofenceStatus::Active,
            assigned_employee_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.geofence_repository.store_geofence(&geofence)?;
        info!(
            "Created geofence {} ({}) for organization {}",
            geofence.name,
            geofence.id,
            scope.organization_id()
        );

        Ok(CreateGeofenceResult { geofence })
    }

    fn validate_create_command(&self, command: &CreateGeofenceCommand) -> Result<()> {
        if command.name.trim().is_empty() {
            return Err(anyhow!("Geofence name cannot be empty"));
        }
        command.center.validate()?;
        if command.radius_meters < MIN_RADIUS_METERS || command.radius_meters > MAX_RADIUS_METERS {
            return Err(anyhow!(
                "Geofence radius must be between {} and {} meters, got {}",
                MIN_RADIUS_METERS,
                MAX_RADIUS_METERS,
                command.radius_meters
            ));
        }
        if command.settings.grace_period_minutes > MAX_GRACE_PERIOD_MINUTES {
            return Err(anyhow!(
                "Grace period cannot exceed {} minutes",
                MAX_GRACE_PERIOD_MINUTES
            ));
        }
        Ok(())
    }

    /// Get a geofence by ID within the caller's scope
    pub fn get_geofence(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        geofence_id: &str,
    ) -> Result<GeofenceDefinition> {
        let scope = ctx.scope(Some(organization_id))?;
        self.geofence_repository
            .get_geofence(scope.organization_id(), geofence_id)?
            .ok_or_else(|| {
                AttendanceError::NotFound {
                    kind: "geofence",
                    id: geofence_id.to_string(),
                }
                .into()
            })
    }

    /// List all geofences of one organization
    pub fn list_geofences(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
    ) -> Result<Vec<GeofenceDefinition>> {
        let scope = ctx.scope(Some(organization_id))?;
        self.geofence_repository
            .list_geofences(scope.organization_id())
    }

    /// Active geofences within `max_distance_meters` of a point, ordered by
    /// ascending distance (id as tie-breaker, so the order is deterministic).
    pub fn find_candidates(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        point: Coordinate,
        max_distance_meters: f64,
    ) -> Result<Vec<GeofenceDefinition>> {
        point.validate()?;
        let scope = ctx.scope(Some(organization_id))?;

        let mut candidates = Vec::new();
        for geofence in self
            .geofence_repository
            .list_geofences(scope.organization_id())?
        {
            if geofence.status != GeofenceStatus::Active {
                continue;
            }
            let distance = geo::distance_meters(point, geofence.center)?;
            if distance <= max_distance_meters {
                candidates.push((distance, geofence));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        Ok(candidates
            .into_iter()
            .map(|(_, geofence)| geofence)
            .collect())
    }

    /// Geofences an employee is assigned to, any status
    pub fn find_by_employee(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: &str,
    ) -> Result<Vec<GeofenceDefinition>> {
        let scope = ctx.scope(Some(organization_id))?;
        let geofences = self
            .geofence_repository
            .list_geofences(scope.organization_id())?;
        Ok(geofences
            .into_iter()
            .filter(|geofence| geofence.is_assigned(employee_id))
            .collect())
    }

    /// Assign an employee to a geofence. Assigning an already-assigned
    /// employee is a no-op that still succeeds.
    pub fn assign_employee(
        &self,
        ctx: &TenantContext,
        command: AssignEmployeeCommand,
    ) -> Result<GeofenceDefinition> {
        let mut geofence =
            self.get_geofence(ctx, &command.organization_id, &command.geofence_id)?;

        if geofence.is_assigned(&command.employee_id) {
            info!(
                "Employee {} already assigned to geofence {}",
                command.employee_id, command.geofence_id
            );
            return Ok(geofence);
        }

        geofence
            .assigned_employee_ids
            .push(command.employee_id.clone());
        geofence.updated_at = Utc::now();
        self.geofence_repository.update_geofence(&geofence)?;

        info!(
            "Assigned employee {} to geofence {}",
            command.employee_id, command.geofence_id
        );
        Ok(geofence)
    }

    /// Remove an employee from a geofence. Removing an unassigned employee
    /// is a no-op that still succeeds.
    pub fn remove_employee(
        &self,
        ctx: &TenantContext,
        command: RemoveEmployeeCommand,
    ) -> Result<GeofenceDefinition> {
        let mut geofence =
            self.get_geofence(ctx, &command.organization_id, &command.geofence_id)?;

        if !geofence.is_assigned(&command.employee_id) {
            return Ok(geofence);
        }

        geofence
            .assigned_employee_ids
            .retain(|id| id != &command.employee_id);
        geofence.updated_at = Utc::now();
        self.geofence_repository.update_geofence(&geofence)?;

        info!(
            "Removed employee {} from geofence {}",
            command.employee_id, command.geofence_id
        );
        Ok(geofence)
    }

    /// Move a geofence along its one-directional lifecycle. Requesting the
    /// status it already has is a no-op that still succeeds.
    pub fn update_status(
        &self,
        ctx: &TenantContext,
        command: UpdateGeofenceStatusCommand,
    ) -> Result<GeofenceDefinition> {
        let mut geofence =
            self.get_geofence(ctx, &command.organization_id, &command.geofence_id)?;

        if geofence.status == command.status {
            return Ok(geofence);
        }
        if !geofence.status.can_transition_to(command.status) {
            warn!(
                "Rejected geofence {} status change {} -> {}",
                geofence.id,
                geofence.status.as_str(),
                command.status.as_str()
            );
            return Err(AttendanceError::InvalidTransition {
                reason: format!(
                    "geofence status cannot move from {} to {}",
                    geofence.status.as_str(),
                    command.status.as_str()
                ),
            }
            .into());
        }

        geofence.status = command.status;
        geofence.updated_at = Utc::now();
        self.geofence_repository.update_geofence(&geofence)?;
        info!(
            "Geofence {} is now {}",
            geofence.id,
            geofence.status.as_str()
        );
        Ok(geofence)
    }

    /// Archive a geofence (terminal status)
    pub fn archive(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        geofence_id: &str,
    ) -> Result<GeofenceDefinition> {
        self.update_status(
            ctx,
            UpdateGeofenceStatusCommand {
                organization_id: organization_id.to_string(),
                geofence_id: geofence_id.to_string(),
                status: GeofenceStatus::Archived,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::geofence::{GeofenceSchedule, GeofenceSettings};

    fn create_test_service() -> (GeofenceService, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let connection = Arc::new(CsvConnection::new(temp_dir.path()).unwrap());
        (GeofenceService::new(connection), temp_dir)
    }

    fn create_command(organization_id: &str, name: &str, center: Coordinate) -> CreateGeofenceCommand {
        CreateGeofenceCommand {
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            center,
            radius_meters: 100.0,
            schedule: GeofenceSchedule::disabled(),
            settings: GeofenceSettings::default(),
        }
    }

    fn org_ctx(organization_id: &str) -> TenantContext {
        TenantContext::organization(organization_id)
    }

    #[test]
    fn test_create_and_get_geofence() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let result = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Main office", Coordinate::new(37.4419, -122.1430)),
            )
            .unwrap();

        let loaded = service
            .get_geofence(&ctx, "org-a", &result.geofence.id)
            .unwrap();
        assert_eq!(loaded.name, "Main office");
        assert_eq!(loaded.status, GeofenceStatus::Active);
    }

    #[test]
    fn test_radius_bounds_are_enforced() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");

        let mut command = create_command("org-a", "Too small", Coordinate::new(0.0, 0.0));
        command.radius_meters = 49.9;
        assert!(service.create_geofence(&ctx, command).is_err());

        let mut command = create_command("org-a", "Too big", Coordinate::new(0.0, 0.0));
        command.radius_meters = 10_001.0;
        assert!(service.create_geofence(&ctx, command).is_err());
    }

    #[test]
    fn test_grace_period_bound_is_enforced() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let mut command = create_command("org-a", "Office", Coordinate::new(0.0, 0.0));
        command.settings.grace_period_minutes = 61;
        assert!(service.create_geofence(&ctx, command).is_err());
    }

    #[test]
    fn test_assign_employee_is_idempotent() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let geofence = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Office", Coordinate::new(0.0, 0.0)),
            )
            .unwrap()
            .geofence;

        let command = AssignEmployeeCommand {
            organization_id: "org-a".to_string(),
            geofence_id: geofence.id.clone(),
            employee_id: "emp-1".to_string(),
        };
        service.assign_employee(&ctx, command.clone()).unwrap();
        let geofence = service.assign_employee(&ctx, command).unwrap();
        assert_eq!(geofence.assigned_employee_ids, vec!["emp-1".to_string()]);
    }

    #[test]
    fn test_remove_employee_is_idempotent() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let geofence = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Office", Coordinate::new(0.0, 0.0)),
            )
            .unwrap()
            .geofence;

        let command = RemoveEmployeeCommand {
            organization_id: "org-a".to_string(),
            geofence_id: geofence.id.clone(),
            employee_id: "emp-1".to_string(),
        };
        // Removing an employee that was never assigned still succeeds.
        let geofence = service.remove_employee(&ctx, command).unwrap();
        assert!(geofence.assigned_employee_ids.is_empty());
    }

    #[test]
    fn test_status_lifecycle_is_one_directional() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let geofence = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Office", Coordinate::new(0.0, 0.0)),
            )
            .unwrap()
            .geofence;

        let inactive = service
            .update_status(
                &ctx,
                UpdateGeofenceStatusCommand {
                    organization_id: "org-a".to_string(),
                    geofence_id: geofence.id.clone(),
                    status: GeofenceStatus::Inactive,
                },
            )
            .unwrap();
        assert_eq!(inactive.status, GeofenceStatus::Inactive);

        // No reactivation.
        let err = service
            .update_status(
                &ctx,
                UpdateGeofenceStatusCommand {
                    organization_id: "org-a".to_string(),
                    geofence_id: geofence.id.clone(),
                    status: GeofenceStatus::Active,
                },
            )
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AttendanceError>(),
            Some(AttendanceError::InvalidTransition { .. })
        ));

        // Archiving twice is a no-op the second time.
        service.archive(&ctx, "org-a", &geofence.id).unwrap();
        let archived = service.archive(&ctx, "org-a", &geofence.id).unwrap();
        assert_eq!(archived.status, GeofenceStatus::Archived);
    }

    #[test]
    fn test_candidates_are_distance_ordered_and_active_only() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let point = Coordinate::new(37.4419, -122.1430);

        let far = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Far", Coordinate::new(37.4600, -122.1430)),
            )
            .unwrap()
            .geofence;
        let near = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Near", Coordinate::new(37.4428, -122.1430)),
            )
            .unwrap()
            .geofence;
        let archived = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Archived", Coordinate::new(37.4421, -122.1430)),
            )
            .unwrap()
            .geofence;
        service.archive(&ctx, "org-a", &archived.id).unwrap();

        let candidates = service
            .find_candidates(&ctx, "org-a", point, 10_000.0)
            .unwrap();
        let ids: Vec<_> = candidates.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec![near.id.as_str(), far.id.as_str()]);

        // Repeatable for a fixed input.
        let again = service
            .find_candidates(&ctx, "org-a", point, 10_000.0)
            .unwrap();
        assert_eq!(candidates, again);
    }

    #[test]
    fn test_tenancy_isolation() {
        let (service, _temp_dir) = create_test_service();
        let ctx_a = org_ctx("org-a");
        let ctx_b = org_ctx("org-b");
        let platform = TenantContext::Platform;

        let geofence = service
            .create_geofence(
                &ctx_a,
                create_command("org-a", "Office", Coordinate::new(0.0, 0.0)),
            )
            .unwrap()
            .geofence;

        // Organization B naming organization A's scope is a violation.
        let err = service
            .get_geofence(&ctx_b, "org-a", &geofence.id)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AttendanceError>(),
            Some(AttendanceError::TenancyViolation { .. })
        ));

        // The id does not exist inside organization B's own scope.
        let err = service
            .get_geofence(&ctx_b, "org-b", &geofence.id)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AttendanceError>(),
            Some(AttendanceError::NotFound { .. })
        ));

        // A platform operator may address any organization.
        let loaded = service
            .get_geofence(&platform, "org-a", &geofence.id)
            .unwrap();
        assert_eq!(loaded.id, geofence.id);
    }

    #[test]
    fn test_find_by_employee_filters_assignments() {
        let (service, _temp_dir) = create_test_service();
        let ctx = org_ctx("org-a");
        let assigned = service
            .create_geofence(
                &ctx,
                create_command("org-a", "Mine", Coordinate::new(0.0, 0.0)),
            )
            .unwrap()
            .geofence;
        service
            .create_geofence(
                &ctx,
                create_command("org-a", "Not mine", Coordinate::new(1.0, 1.0)),
            )
            .unwrap();

        service
            .assign_employee(
                &ctx,
                AssignEmployeeCommand {
                    organization_id: "org-a".to_string(),
                    geofence_id: assigned.id.clone(),
                    employee_id: "emp-1".to_string(),
                },
            )
            .unwrap();

        let geofences = service.find_by_employee(&ctx, "org-a", "emp-1").unwrap();
        assert_eq!(geofences.len(), 1);
        assert_eq!(geofences[0].id, assigned.id);
    }
}
