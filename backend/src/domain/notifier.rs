//! Notification port for emitted attendance events.
//!
//! The engine only invokes the port; concrete email/SMS/push delivery lives
//! in the calling layer. Delivery failures are logged by the attendance
//! service and never fail the transition that produced the event.

use anyhow::Result;
use log::info;
use serde_json::json;

use crate::domain::models::attendance::AttendanceEvent;

pub trait AttendanceNotifier: Send + Sync {
    fn notify(&self, employee_id: &str, event: &AttendanceEvent) -> Result<()>;
}

/// Notifier that only writes to the log. Used when no delivery channel is
/// configured.
pub struct LogNotifier;

impl AttendanceNotifier for LogNotifier {
    fn notify(&self, employee_id: &str, event: &AttendanceEvent) -> Result<()> {
        let payload = json!({
            "event_id": event.id,
            "event_type": event.event_type.as_str(),
            "geofence_id": event.geofence_id,
            "timestamp": event.timestamp.to_rfc3339(),
        });
        info!("notification for employee {}: {}", employee_id, payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::Coordinate;
    use crate::domain::models::attendance::AttendanceEventType;

    #[test]
    fn test_log_notifier_accepts_any_event() {
        let event = AttendanceEvent {
            id: "att-ci-1-abc".to_string(),
            employee_id: "emp-1".to_string(),
            organization_id: "org-1".to_string(),
            geofence_id: "geofence::1".to_string(),
            event_type: AttendanceEventType::CheckIn,
            timestamp: "2025-06-02T09:07:00Z".parse().unwrap(),
            location: Coordinate::new(37.4419, -122.1430),
            is_on_time: Some(true),
            late_minutes: Some(0),
            total_hours: None,
        };
        assert!(LogNotifier.notify("emp-1", &event).is_ok());
    }
}
