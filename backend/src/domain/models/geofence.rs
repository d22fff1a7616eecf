//! Domain model for a geofence definition.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::geo::Coordinate;

/// Smallest radius a geofence may have, in meters.
pub const MIN_RADIUS_METERS: f64 = 50.0;
/// Largest radius a geofence may have, in meters.
pub const MAX_RADIUS_METERS: f64 = 10_000.0;
/// Upper bound on the lateness grace period, in minutes.
pub const MAX_GRACE_PERIOD_MINUTES: u32 = 60;

/// Lifecycle status of a geofence. Moves one way only:
/// Active -> Inactive -> Archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeofenceStatus {
    Active,
    Inactive,
    Archived,
}

impl GeofenceStatus {
    /// Convert to string for CSV storage
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceStatus::Active => "active",
            GeofenceStatus::Inactive => "inactive",
            GeofenceStatus::Archived => "archived",
        }
    }

    /// Parse from string for CSV loading
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GeofenceStatus::Active),
            "inactive" => Ok(GeofenceStatus::Inactive),
            "archived" => Ok(GeofenceStatus::Archived),
            _ => Err(format!("Invalid geofence status: {}", s)),
        }
    }

    /// Whether the one-directional lifecycle permits moving to `next`.
    pub fn can_transition_to(&self, next: GeofenceStatus) -> bool {
        use GeofenceStatus::*;
        matches!(
            (self, next),
            (Active, Inactive) | (Active, Archived) | (Inactive, Archived)
        )
    }
}

/// Work schedule used for lateness evaluation on check-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceSchedule {
    pub enabled: bool,
    pub work_days: Vec<Weekday>,
    /// Scheduled start of the work day
    pub start: NaiveTime,
    /// Scheduled end of the work day
    pub end: NaiveTime,
}

impl GeofenceSchedule {
    /// A schedule that never evaluates lateness.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            work_days: Vec::new(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        }
    }

    /// Whether lateness is evaluated at all on the given weekday.
    pub fn applies_on(&self, weekday: Weekday) -> bool {
        self.enabled && self.work_days.contains(&weekday)
    }
}

/// Per-geofence behavior switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceSettings {
    pub entry_notification: bool,
    pub exit_notification: bool,
    /// Whether location pings may check employees in/out automatically
    pub auto_check_in: bool,
    /// Minutes of lateness tolerance, 0-60
    pub grace_period_minutes: u32,
}

impl Default for GeofenceSettings {
    fn default() -> Self {
        Self {
            entry_notification: true,
            exit_notification: true,
            auto_check_in: true,
            grace_period_minutes: 0,
        }
    }
}

/// A named circular check-in/check-out zone owned by one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceDefinition {
    pub id: String,
    /// Tenant key; immutable after creation
    pub organization_id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub schedule: GeofenceSchedule,
    pub settings: GeofenceSettings,
    pub status: GeofenceStatus,
    pub assigned_employee_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GeofenceDefinition {
    /// Generate a unique ID for a geofence.
    /// Format: geofence::<timestamp_ms>-<random_suffix>
    pub fn generate_id(timestamp_millis: u64) -> String {
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(4)
            .collect();
        format!("geofence::{}-{}", timestamp_millis, suffix)
    }

    pub fn is_assigned(&self, employee_id: &str) -> bool {
        self.assigned_employee_ids
            .iter()
            .any(|id| id == employee_id)
    }

    /// Wire representation for the HTTP layer.
    pub fn to_dto(&self) -> shared::GeofenceDto {
        shared::GeofenceDto {
            id: self.id.clone(),
            organization_id: self.organization_id.clone(),
            name: self.name.clone(),
            center: self.center.into(),
            radius_meters: self.radius_meters,
            status: self.status.as_str().to_string(),
            schedule: shared::GeofenceScheduleDto {
                enabled: self.schedule.enabled,
                work_days: self
                    .schedule
                    .work_days
                    .iter()
                    .map(|day| day.to_string())
                    .collect(),
                start: self.schedule.start.format("%H:%M").to_string(),
                end: self.schedule.end.format("%H:%M").to_string(),
            },
            settings: shared::GeofenceSettingsDto {
                entry_notification: self.settings.entry_notification,
                exit_notification: self.settings.exit_notification,
                auto_check_in: self.settings.auto_check_in,
                grace_period_minutes: self.settings.grace_period_minutes,
            },
            assigned_employee_ids: self.assigned_employee_ids.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lifecycle_is_one_directional() {
        use GeofenceStatus::*;
        assert!(Active.can_transition_to(Inactive));
        assert!(Active.can_transition_to(Archived));
        assert!(Inactive.can_transition_to(Archived));

        assert!(!Inactive.can_transition_to(Active));
        assert!(!Archived.can_transition_to(Active));
        assert!(!Archived.can_transition_to(Inactive));
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        for status in [
            GeofenceStatus::Active,
            GeofenceStatus::Inactive,
            GeofenceStatus::Archived,
        ] {
            assert_eq!(GeofenceStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(GeofenceStatus::from_str("deleted").is_err());
    }

    #[test]
    fn test_disabled_schedule_applies_nowhere() {
        let schedule = GeofenceSchedule::disabled();
        assert!(!schedule.applies_on(Weekday::Mon));
        assert!(!schedule.applies_on(Weekday::Sun));
    }

    #[test]
    fn test_schedule_applies_only_on_work_days() {
        let schedule = GeofenceSchedule {
            enabled: true,
            work_days: vec![Weekday::Mon, Weekday::Tue],
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        };
        assert!(schedule.applies_on(Weekday::Mon));
        assert!(!schedule.applies_on(Weekday::Sat));
    }
}
