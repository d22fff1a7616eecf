//! Membership evaluation: which geofences contain a given point.

use anyhow::Result;
use log::debug;

use crate::domain::geo::{self, Coordinate};
use crate::domain::geofence_service::GeofenceService;
use crate::domain::models::attendance::MembershipResult;
use crate::domain::tenancy::TenantContext;

/// Outer bound for the candidate search. Candidates are gathered inside
/// this radius first, then each gets the exact point-in-circle test, so a
/// full scan of distant geofences is avoided.
pub const CANDIDATE_SEARCH_RADIUS_METERS: f64 = 10_000.0;

/// Service evaluating point-in-circle membership against the registry.
///
/// Pure read over registry state at call time; no persistence side effects.
#[derive(Clone)]
pub struct MembershipService {
    geofence_service: GeofenceService,
}

impl MembershipService {
    pub fn new(geofence_service: GeofenceService) -> Self {
        Self { geofence_service }
    }

    /// One `MembershipResult` per candidate geofence, in candidate
    /// (ascending distance) order. When `employee_id` is supplied, results
    /// are restricted to geofences assigned to that employee.
    pub fn evaluate(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: Option<&str>,
        point: Coordinate,
    ) -> Result<Vec<MembershipResult>> {
        point.validate()?;

        let candidates = self.geofence_service.find_candidates(
            ctx,
            organization_id,
            point,
            CANDIDATE_SEARCH_RADIUS_METERS,
        )?;

        let mut results = Vec::new();
        for geofence in candidates {
            if let Some(employee_id) = employee_id {
                if !geofence.is_assigned(employee_id) {
                    continue;
                }
            }
            let distance = geo::distance_meters(point, geofence.center)?;
            results.push(MembershipResult {
                geofence_id: geofence.id.clone(),
                is_inside: distance <= geofence.radius_meters,
                distance_meters: distance,
            });
        }

        debug!(
            "Evaluated {} membership candidates for organization {}",
            results.len(),
            organization_id
        );
        Ok(results)
    }
}
