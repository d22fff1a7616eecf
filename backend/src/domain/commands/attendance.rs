//! Commands and results for attendance operations.

use chrono::{DateTime, Utc};

use crate::domain::geo::Coordinate;
use crate::domain::models::attendance::{AttendanceEvent, EmployeeAttendanceState};

/// A location ping for one employee. Timestamps always come from the
/// caller so every transition decision is reproducible.
#[derive(Debug, Clone)]
pub struct LocationPingCommand {
    pub organization_id: String,
    pub employee_id: String,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
}

/// The state after processing a ping, plus any events the ping produced.
/// A ping that changes nothing returns the unchanged state and no events.
#[derive(Debug, Clone)]
pub struct LocationPingResult {
    pub state: EmployeeAttendanceState,
    pub events: Vec<AttendanceEvent>,
}

/// Explicit check-in, requested by the employee or an admin on their
/// behalf. Actor authorization happens in the calling layer.
#[derive(Debug, Clone)]
pub struct ManualCheckInCommand {
    pub organization_id: String,
    pub employee_id: String,
    pub geofence_id: String,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
}

/// Explicit check-out against the geofence of the open session.
#[derive(Debug, Clone)]
pub struct ManualCheckOutCommand {
    pub organization_id: String,
    pub employee_id: String,
    pub geofence_id: String,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
}

/// Break start/end request; the open session decides the geofence.
#[derive(Debug, Clone)]
pub struct BreakCommand {
    pub organization_id: String,
    pub employee_id: String,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
}

/// Inclusive time range for ledger queries. Open ends are unbounded.
#[derive(Debug, Clone, Default)]
pub struct EventRangeQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Single-pass aggregation over a set of ledger events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceStats {
    /// Total events in range, all types
    pub count: usize,
    pub on_time_count: usize,
    pub late_count: usize,
    pub total_late_minutes: i64,
    pub total_hours: f64,
}

impl AttendanceStats {
    pub fn to_dto(&self) -> shared::AttendanceStatsResponse {
        shared::AttendanceStatsResponse {
            count: self.count,
            on_time_count: self.on_time_count,
            late_count: self.late_count,
            total_late_minutes: self.total_late_minutes,
            total_hours: self.total_hours,
        }
    }
}
