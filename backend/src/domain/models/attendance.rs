//! Domain models for employee attendance state and the event ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::geo::Coordinate;

/// Where an employee currently stands in the attendance state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    CheckedOut,
    CheckedIn,
    OnBreak,
}

impl AttendanceStatus {
    /// Convert to string for CSV storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::CheckedOut => "checked-out",
            AttendanceStatus::CheckedIn => "checked-in",
            AttendanceStatus::OnBreak => "on-break",
        }
    }

    /// Parse from string for CSV loading
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "checked-out" => Ok(AttendanceStatus::CheckedOut),
            "checked-in" => Ok(AttendanceStatus::CheckedIn),
            "on-break" => Ok(AttendanceStatus::OnBreak),
            _ => Err(format!("Invalid attendance status: {}", s)),
        }
    }
}

/// Timestamped location at which an employee last crossed a session
/// boundary (checked in or out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub timestamp: DateTime<Utc>,
    pub geofence_id: String,
    pub location: Coordinate,
}

impl SessionMarker {
    pub fn to_dto(&self) -> shared::SessionMarkerDto {
        shared::SessionMarkerDto {
            timestamp: self.timestamp.to_rfc3339(),
            geofence_id: self.geofence_id.clone(),
            location: self.location.into(),
        }
    }
}

/// The single mutable attendance pointer per employee.
///
/// Created implicitly with a `CheckedOut` status the first time the engine
/// sees an employee; mutated only by state-machine transitions; never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeAttendanceState {
    pub employee_id: String,
    pub organization_id: String,
    pub current_status: AttendanceStatus,
    pub last_check_in: Option<SessionMarker>,
    pub last_check_out: Option<SessionMarker>,
    pub auto_check_in_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeAttendanceState {
    /// Fresh state for an employee that has never checked in.
    pub fn initial(organization_id: &str, employee_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            organization_id: organization_id.to_string(),
            current_status: AttendanceStatus::CheckedOut,
            last_check_in: None,
            last_check_out: None,
            auto_check_in_enabled: true,
            updated_at: now,
        }
    }

    pub fn to_dto(&self) -> shared::AttendanceStateDto {
        shared::AttendanceStateDto {
            employee_id: self.employee_id.clone(),
            organization_id: self.organization_id.clone(),
            current_status: self.current_status.as_str().to_string(),
            last_check_in: self.last_check_in.as_ref().map(SessionMarker::to_dto),
            last_check_out: self.last_check_out.as_ref().map(SessionMarker::to_dto),
            auto_check_in_enabled: self.auto_check_in_enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceEventType {
    CheckIn,
    CheckOut,
    BreakStart,
    BreakEnd,
}

impl AttendanceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceEventType::CheckIn => "check-in",
            AttendanceEventType::CheckOut => "check-out",
            AttendanceEventType::BreakStart => "break-start",
            AttendanceEventType::BreakEnd => "break-end",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "check-in" => Ok(AttendanceEventType::CheckIn),
            "check-out" => Ok(AttendanceEventType::CheckOut),
            "break-start" => Ok(AttendanceEventType::BreakStart),
            "break-end" => Ok(AttendanceEventType::BreakEnd),
            _ => Err(format!("Invalid attendance event type: {}", s)),
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            AttendanceEventType::CheckIn => "ci",
            AttendanceEventType::CheckOut => "co",
            AttendanceEventType::BreakStart => "bs",
            AttendanceEventType::BreakEnd => "be",
        }
    }
}

/// One immutable row in the attendance ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: String,
    pub employee_id: String,
    pub organization_id: String,
    pub geofence_id: String,
    pub event_type: AttendanceEventType,
    pub timestamp: DateTime<Utc>,
    pub location: Coordinate,
    /// Populated on check-in events only
    pub is_on_time: Option<bool>,
    /// Minutes late after the grace period, check-in events only
    pub late_minutes: Option<i64>,
    /// Worked hours for the closed session, check-out events only
    pub total_hours: Option<f64>,
}

impl AttendanceEvent {
    /// Generate a unique event ID based on type and timestamp.
    /// Format: att-<type>-<timestamp_ms>-<random_suffix>
    /// Example: att-ci-1625846400123-a3f19c
    pub fn generate_id(event_type: AttendanceEventType, timestamp_millis: i64) -> String {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
        format!(
            "att-{}-{}-{}",
            event_type.id_prefix(),
            timestamp_millis,
            suffix
        )
    }

    pub fn to_dto(&self) -> shared::AttendanceEventDto {
        shared::AttendanceEventDto {
            id: self.id.clone(),
            employee_id: self.employee_id.clone(),
            organization_id: self.organization_id.clone(),
            geofence_id: self.geofence_id.clone(),
            event_type: self.event_type.as_str().to_string(),
            timestamp: self.timestamp.to_rfc3339(),
            location: self.location.into(),
            is_on_time: self.is_on_time,
            late_minutes: self.late_minutes,
            total_hours: self.total_hours,
        }
    }
}

/// Transient result of a point-in-circle test; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipResult {
    pub geofence_id: String,
    pub is_inside: bool,
    pub distance_meters: f64,
}
