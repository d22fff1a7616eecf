//! CSV-based attendance event repository.
//!
//! The events file is the ledger: rows are appended and never rewritten.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use csv::{Reader, Writer, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::geo::Coordinate;
use crate::domain::models::attendance::{AttendanceEvent, AttendanceEventType};
use crate::storage::traits::AttendanceEventStorage;

const HEADER: [&str; 11] = [
    "id",
    "employee_id",
    "organization_id",
    "geofence_id",
    "event_type",
    "timestamp",
    "latitude",
    "longitude",
    "is_on_time",
    "late_minutes",
    "total_hours",
];

/// CSV-based attendance event repository
#[derive(Debug, Clone)]
pub struct EventRepository {
    connection: CsvConnection,
}

impl EventRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Create the events file with its header row if it does not exist yet
    fn ensure_events_file_exists(&self, organization_id: &str) -> Result<()> {
        self.connection.ensure_organization_dir(organization_id)?;
        let file_path = self.connection.events_file_path(organization_id);
        if file_path.exists() {
            return Ok(());
        }
        let file = File::create(&file_path)
            .with_context(|| format!("failed to create {}", file_path.display()))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));
        csv_writer.write_record(HEADER)?;
        csv_writer.flush()?;
        Ok(())
    }

    /// Read every event of one organization, in file (append) order
    fn read_events(&self, organization_id: &str) -> Result<Vec<AttendanceEvent>> {
        let file_path = self.connection.events_file_path(organization_id);
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut events = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            events.push(parse_record(&record)?);
        }
        Ok(events)
    }
}

impl AttendanceEventStorage for EventRepository {
    fn append_event(&self, event: &AttendanceEvent) -> Result<()> {
        self.ensure_events_file_exists(&event.organization_id)?;
        let file_path = self.connection.events_file_path(&event.organization_id);

        let file = OpenOptions::new()
            .append(true)
            .open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        csv_writer.write_record(&to_record(event))?;
        csv_writer.flush()?;
        Ok(())
    }

    fn list_events(
        &self,
        organization_id: &str,
        employee_id: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceEvent>> {
        let mut events = self.read_events(organization_id)?;
        events.retain(|event| {
            if let Some(employee_id) = employee_id {
                if event.employee_id != employee_id {
                    return false;
                }
            }
            if let Some(from) = from {
                if event.timestamp < from {
                    return false;
                }
            }
            if let Some(to) = to {
                if event.timestamp > to {
                    return false;
                }
            }
            true
        });
        // Timestamp order with the id as tie-breaker keeps repeated queries
        // identical.
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(events)
    }

    fn event_id_exists(&self, organization_id: &str, event_id: &str) -> Result<bool> {
        let events = self.read_events(organization_id)?;
        Ok(events.iter().any(|event| event.id == event_id))
    }
}

fn to_record(event: &AttendanceEvent) -> Vec<String> {
    vec![
        event.id.clone(),
        event.employee_id.clone(),
        event.organization_id.clone(),
        event.geofence_id.clone(),
        event.event_type.as_str().to_string(),
        event.timestamp.to_rfc3339(),
        event.location.latitude.to_string(),
        event.location.longitude.to_string(),
        event
            .is_on_time
            .map(|value| value.to_string())
            .unwrap_or_default(),
        event
            .late_minutes
            .map(|value| value.to_string())
            .unwrap_or_default(),
        event
            .total_hours
            .map(|value| value.to_string())
            .unwrap_or_default(),
    ]
}

fn parse_record(record: &csv::StringRecord) -> Result<AttendanceEvent> {
    let field = |index: usize| record.get(index).unwrap_or("");

    Ok(AttendanceEvent {
        id: field(0).to_string(),
        employee_id: field(1).to_string(),
        organization_id: field(2).to_string(),
        geofence_id: field(3).to_string(),
        event_type: AttendanceEventType::from_str(field(4)).map_err(|e| anyhow!(e))?,
        timestamp: DateTime::parse_from_rfc3339(field(5))
            .with_context(|| format!("invalid timestamp in event record: {}", field(5)))?
            .with_timezone(&Utc),
        location: Coordinate::new(
            field(6).parse().context("invalid latitude in event record")?,
            field(7)
                .parse()
                .context("invalid longitude in event record")?,
        ),
        is_on_time: parse_optional(field(8)),
        late_minutes: parse_optional(field(9)),
        total_hours: parse_optional(field(10)),
    })
}

fn parse_optional<T: std::str::FromStr>(field: &str) -> Option<T> {
    if field.is_empty() {
        None
    } else {
        field.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(
        id: &str,
        employee_id: &str,
        organization_id: &str,
        timestamp: &str,
    ) -> AttendanceEvent {
        AttendanceEvent {
            id: id.to_string(),
            employee_id: employee_id.to_string(),
            organization_id: organization_id.to_string(),
            geofence_id: "geofence::1".to_string(),
            event_type: AttendanceEventType::CheckIn,
            timestamp: timestamp.parse().unwrap(),
            location: Coordinate::new(37.4419, -122.1430),
            is_on_time: Some(true),
            late_minutes: Some(0),
            total_hours: None,
        }
    }

    fn create_test_repository() -> (EventRepository, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (EventRepository::new(connection), temp_dir)
    }

    #[test]
    fn test_append_and_read_back() {
        let (repository, _temp_dir) = create_test_repository();
        let event = sample_event("att-ci-1-a", "emp-1", "org-a", "2025-06-02T09:07:00Z");
        repository.append_event(&event).unwrap();

        let events = repository.list_events("org-a", None, None, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "att-ci-1-a");
        assert_eq!(events[0].is_on_time, Some(true));
        assert_eq!(events[0].total_hours, None);
    }

    #[test]
    fn test_events_come_back_in_timestamp_order() {
        let (repository, _temp_dir) = create_test_repository();
        repository
            .append_event(&sample_event(
                "att-ci-2-b",
                "emp-1",
                "org-a",
                "2025-06-02T12:00:00Z",
            ))
            .unwrap();
        repository
            .append_event(&sample_event(
                "att-ci-1-a",
                "emp-1",
                "org-a",
                "2025-06-02T09:00:00Z",
            ))
            .unwrap();

        let events = repository.list_events("org-a", None, None, None).unwrap();
        let ids: Vec<_> = events.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["att-ci-1-a", "att-ci-2-b"]);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let (repository, _temp_dir) = create_test_repository();
        for i in 0..5 {
            repository
                .append_event(&sample_event(
                    &format!("att-ci-{}-x", i),
                    "emp-1",
                    "org-a",
                    "2025-06-02T09:00:00Z",
                ))
                .unwrap();
        }
        let first = repository.list_events("org-a", None, None, None).unwrap();
        let second = repository.list_events("org-a", None, None, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_range_and_employee_filters() {
        let (repository, _temp_dir) = create_test_repository();
        repository
            .append_event(&sample_event(
                "att-ci-1-a",
                "emp-1",
                "org-a",
                "2025-06-02T09:00:00Z",
            ))
            .unwrap();
        repository
            .append_event(&sample_event(
                "att-ci-2-b",
                "emp-2",
                "org-a",
                "2025-06-03T09:00:00Z",
            ))
            .unwrap();

        let events = repository
            .list_events("org-a", Some("emp-1"), None, None)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].employee_id, "emp-1");

        let events = repository
            .list_events(
                "org-a",
                None,
                Some("2025-06-03T00:00:00Z".parse().unwrap()),
                None,
            )
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].employee_id, "emp-2");

        // Inclusive at both ends.
        let events = repository
            .list_events(
                "org-a",
                None,
                Some("2025-06-02T09:00:00Z".parse().unwrap()),
                Some("2025-06-03T09:00:00Z".parse().unwrap()),
            )
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_event_id_exists() {
        let (repository, _temp_dir) = create_test_repository();
        let event = sample_event("att-ci-1-a", "emp-1", "org-a", "2025-06-02T09:00:00Z");
        repository.append_event(&event).unwrap();

        assert!(repository.event_id_exists("org-a", "att-ci-1-a").unwrap());
        assert!(!repository.event_id_exists("org-a", "att-ci-9-z").unwrap());
        assert!(!repository.event_id_exists("org-b", "att-ci-1-a").unwrap());
    }
}
