//! CSV-based employee attendance state repository.
//!
//! One row per employee. `update_state_if_status` is the optimistic
//! concurrency primitive the state machine commits through.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use csv::{Reader, Writer};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::geo::Coordinate;
use crate::domain::models::attendance::{
    AttendanceStatus, EmployeeAttendanceState, SessionMarker,
};
use crate::storage::traits::EmployeeStateStorage;

const HEADER: [&str; 13] = [
    "employee_id",
    "organization_id",
    "current_status",
    "check_in_timestamp",
    "check_in_geofence_id",
    "check_in_latitude",
    "check_in_longitude",
    "check_out_timestamp",
    "check_out_geofence_id",
    "check_out_latitude",
    "check_out_longitude",
    "auto_check_in_enabled",
    "updated_at",
];

/// CSV-based employee state repository
#[derive(Debug, Clone)]
pub struct StateRepository {
    connection: CsvConnection,
}

impl StateRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_states(&self, organization_id: &str) -> Result<Vec<EmployeeAttendanceState>> {
        let file_path = self.connection.states_file_path(organization_id);
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut states = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            states.push(parse_record(&record)?);
        }
        Ok(states)
    }

    fn write_states(
        &self,
        organization_id: &str,
        states: &[EmployeeAttendanceState],
    ) -> Result<()> {
        self.connection.ensure_organization_dir(organization_id)?;
        let file_path = self.connection.states_file_path(organization_id);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record(HEADER)?;
        for state in states {
            csv_writer.write_record(&to_record(state))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    fn upsert(
        &self,
        states: &mut Vec<EmployeeAttendanceState>,
        state: &EmployeeAttendanceState,
    ) {
        match states
            .iter_mut()
            .find(|existing| existing.employee_id == state.employee_id)
        {
            Some(slot) => *slot = state.clone(),
            None => states.push(state.clone()),
        }
    }
}

impl EmployeeStateStorage for StateRepository {
    fn get_state(
        &self,
        organization_id: &str,
        employee_id: &str,
    ) -> Result<Option<EmployeeAttendanceState>> {
        let states = self.read_states(organization_id)?;
        Ok(states
            .into_iter()
            .find(|state| state.employee_id == employee_id))
    }

    fn put_state(&self, state: &EmployeeAttendanceState) -> Result<()> {
        let mut states = self.read_states(&state.organization_id)?;
        self.upsert(&mut states, state);
        self.write_states(&state.organization_id, &states)
    }

    fn update_state_if_status(
        &self,
        expected: AttendanceStatus,
        state: &EmployeeAttendanceState,
    ) -> Result<bool> {
        let mut states = self.read_states(&state.organization_id)?;
        // An employee with no stored row counts as the initial
        // checked-out state.
        let current_status = states
            .iter()
            .find(|existing| existing.employee_id == state.employee_id)
            .map(|existing| existing.current_status)
            .unwrap_or(AttendanceStatus::CheckedOut);

        if current_status != expected {
            return Ok(false);
        }
        self.upsert(&mut states, state);
        self.write_states(&state.organization_id, &states)?;
        Ok(true)
    }
}

fn marker_fields(marker: Option<&SessionMarker>) -> [String; 4] {
    match marker {
        Some(marker) => [
            marker.timestamp.to_rfc3339(),
            marker.geofence_id.clone(),
            marker.location.latitude.to_string(),
            marker.location.longitude.to_string(),
        ],
        None => Default::default(),
    }
}

fn to_record(state: &EmployeeAttendanceState) -> Vec<String> {
    let check_in = marker_fields(state.last_check_in.as_ref());
    let check_out = marker_fields(state.last_check_out.as_ref());
    let mut record = vec![
        state.employee_id.clone(),
        state.organization_id.clone(),
        state.current_status.as_str().to_string(),
    ];
    record.extend(check_in);
    record.extend(check_out);
    record.push(state.auto_check_in_enabled.to_string());
    record.push(state.updated_at.to_rfc3339());
    record
}

fn parse_marker(
    timestamp: &str,
    geofence_id: &str,
    latitude: &str,
    longitude: &str,
) -> Result<Option<SessionMarker>> {
    if timestamp.is_empty() {
        return Ok(None);
    }
    Ok(Some(SessionMarker {
        timestamp: DateTime::parse_from_rfc3339(timestamp)
            .with_context(|| format!("invalid timestamp in state record: {}", timestamp))?
            .with_timezone(&Utc),
        geofence_id: geofence_id.to_string(),
        location: Coordinate::new(
            latitude.parse().context("invalid latitude in state record")?,
            longitude
                .parse()
                .context("invalid longitude in state record")?,
        ),
    }))
}

fn parse_record(record: &csv::StringRecord) -> Result<EmployeeAttendanceState> {
    let field = |index: usize| record.get(index).unwrap_or("");

    Ok(EmployeeAttendanceState {
        employee_id: field(0).to_string(),
        organization_id: field(1).to_string(),
        current_status: AttendanceStatus::from_str(field(2)).map_err(|e| anyhow!(e))?,
        last_check_in: parse_marker(field(3), field(4), field(5), field(6))?,
        last_check_out: parse_marker(field(7), field(8), field(9), field(10))?,
        auto_check_in_enabled: field(11).parse().unwrap_or(true),
        updated_at: DateTime::parse_from_rfc3339(field(12))
            .with_context(|| format!("invalid timestamp in state record: {}", field(12)))?
            .with_timezone(&Utc),
    })
}
