//! Commands and results for geofence registry operations.

use crate::domain::geo::Coordinate;
use crate::domain::models::geofence::{
    GeofenceDefinition, GeofenceSchedule, GeofenceSettings, GeofenceStatus,
};

#[derive(Debug, Clone)]
pub struct CreateGeofenceCommand {
    pub organization_id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub schedule: GeofenceSchedule,
    pub settings: GeofenceSettings,
}

#[derive(Debug, Clone)]
pub struct CreateGeofenceResult {
    pub geofence: GeofenceDefinition,
}

/// One-directional status change (Active -> Inactive -> Archived).
#[derive(Debug, Clone)]
pub struct UpdateGeofenceStatusCommand {
    pub organization_id: String,
    pub geofence_id: String,
    pub status: GeofenceStatus,
}

#[derive(Debug, Clone)]
pub struct AssignEmployeeCommand {
    pub organization_id: String,
    pub geofence_id: String,
    pub employee_id: String,
}

#[derive(Debug, Clone)]
pub struct RemoveEmployeeCommand {
    pub organization_id: String,
    pub geofence_id: String,
    pub employee_id: String,
}
