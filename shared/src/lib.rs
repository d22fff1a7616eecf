use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS-84 coordinate pair.
///
/// This is the mandated wire shape: `{"latitude": number, "longitude": number}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A location ping reported by an employee device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPingRequest {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Ping timestamp (ISO-8601 UTC) - the receiving layer substitutes its
    /// own clock if absent
    pub timestamp: Option<String>,
}

/// Explicit check-in request for a specific geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCheckInRequest {
    pub geofence_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Explicit check-out request for a specific geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCheckOutRequest {
    pub geofence_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Break start/end request; the open session decides the geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// A recorded attendance event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEventDto {
    pub id: String,
    pub employee_id: String,
    pub organization_id: String,
    pub geofence_id: String,
    /// One of: "check-in", "check-out", "break-start", "break-end"
    pub event_type: String,
    /// ISO-8601 UTC timestamp
    pub timestamp: String,
    pub location: Coordinate,
    /// Populated on check-in events only
    pub is_on_time: Option<bool>,
    /// Minutes late after the grace period, check-in events only
    pub late_minutes: Option<i64>,
    /// Worked hours for the closed session, check-out events only
    pub total_hours: Option<f64>,
}

/// Timestamped location of the last check-in or check-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMarkerDto {
    /// ISO-8601 UTC timestamp
    pub timestamp: String,
    pub geofence_id: String,
    pub location: Coordinate,
}

impl SessionMarkerDto {
    /// Parse the marker timestamp back into a UTC datetime.
    pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// An employee's current attendance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStateDto {
    pub employee_id: String,
    pub organization_id: String,
    /// One of: "checked-out", "checked-in", "on-break"
    pub current_status: String,
    pub last_check_in: Option<SessionMarkerDto>,
    pub last_check_out: Option<SessionMarkerDto>,
    pub auto_check_in_enabled: bool,
}

/// Result of processing a location ping: the (possibly updated) state plus
/// any events the ping produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPingResponse {
    pub state: AttendanceStateDto,
    pub events: Vec<AttendanceEventDto>,
}

/// Time-ranged event listing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListRequest {
    /// Inclusive range start (ISO-8601 UTC)
    pub from: Option<String>,
    /// Inclusive range end (ISO-8601 UTC)
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListResponse {
    pub events: Vec<AttendanceEventDto>,
}

/// Aggregated attendance statistics over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceStatsResponse {
    pub count: usize,
    pub on_time_count: usize,
    pub late_count: usize,
    pub total_late_minutes: i64,
    pub total_hours: f64,
}

/// Work schedule attached to a geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceScheduleDto {
    pub enabled: bool,
    /// Weekday names, e.g. ["Mon", "Tue"]
    pub work_days: Vec<String>,
    /// Work start as "HH:MM"
    pub start: String,
    /// Work end as "HH:MM"
    pub end: String,
}

/// Per-geofence behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceSettingsDto {
    pub entry_notification: bool,
    pub exit_notification: bool,
    pub auto_check_in: bool,
    /// Minutes of lateness tolerance, 0-60
    pub grace_period_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceDto {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    /// One of: "active", "inactive", "archived"
    pub status: String,
    pub schedule: GeofenceScheduleDto,
    pub settings: GeofenceSettingsDto,
    pub assigned_employee_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateGeofenceRequest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
    pub schedule: GeofenceScheduleDto,
    pub settings: GeofenceSettingsDto,
}
