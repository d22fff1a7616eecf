//! CSV-based geofence definition repository.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use csv::{Reader, Writer};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::geo::Coordinate;
use crate::domain::models::geofence::{
    GeofenceDefinition, GeofenceSchedule, GeofenceSettings, GeofenceStatus,
};
use crate::storage::traits::GeofenceStorage;

const HEADER: [&str; 18] = [
    "id",
    "organization_id",
    "name",
    "latitude",
    "longitude",
    "radius_meters",
    "status",
    "schedule_enabled",
    "work_days",
    "work_start",
    "work_end",
    "entry_notification",
    "exit_notification",
    "auto_check_in",
    "grace_period_minutes",
    "assigned_employee_ids",
    "created_at",
    "updated_at",
];

/// CSV-based geofence repository
#[derive(Debug, Clone)]
pub struct GeofenceRepository {
    connection: CsvConnection,
}

impl GeofenceRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all geofence definitions of one organization from its CSV file
    fn read_geofences(&self, organization_id: &str) -> Result<Vec<GeofenceDefinition>> {
        let file_path = self.connection.geofences_file_path(organization_id);
        if !file_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut geofences = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            geofences.push(parse_record(&record)?);
        }
        Ok(geofences)
    }

    /// Write all geofence definitions of one organization to its CSV file
    fn write_geofences(
        &self,
        organization_id: &str,
        geofences: &[GeofenceDefinition],
    ) -> Result<()> {
        self.connection.ensure_organization_dir(organization_id)?;
        let file_path = self.connection.geofences_file_path(organization_id);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&file_path)
            .with_context(|| format!("failed to open {}", file_path.display()))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record(HEADER)?;
        for geofence in geofences {
            csv_writer.write_record(&to_record(geofence))?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

impl GeofenceStorage for GeofenceRepository {
    fn store_geofence(&self, geofence: &GeofenceDefinition) -> Result<()> {
        let mut geofences = self.read_geofences(&geofence.organization_id)?;
        if geofences.iter().any(|g| g.id == geofence.id) {
            return Err(anyhow!("geofence id already exists: {}", geofence.id));
        }
        geofences.push(geofence.clone());
        self.write_geofences(&geofence.organization_id, &geofences)
    }

    fn get_geofence(
        &self,
        organization_id: &str,
        geofence_id: &str,
    ) -> Result<Option<GeofenceDefinition>> {
        let geofences = self.read_geofences(organization_id)?;
        Ok(geofences.into_iter().find(|g| g.id == geofence_id))
    }

    fn list_geofences(&self, organization_id: &str) -> Result<Vec<GeofenceDefinition>> {
        self.read_geofences(organization_id)
    }

    fn update_geofence(&self, geofence: &GeofenceDefinition) -> Result<()> {
        let mut geofences = self.read_geofences(&geofence.organization_id)?;
        let slot = geofences
            .iter_mut()
            .find(|g| g.id == geofence.id)
            .ok_or_else(|| {
                anyhow!(
                    "geofence {} not found in organization {}",
                    geofence.id,
                    geofence.organization_id
                )
            })?;
        *slot = geofence.clone();
        self.write_geofences(&geofence.organization_id, &geofences)
    }
}

fn to_record(geofence: &GeofenceDefinition) -> Vec<String> {
    vec![
        geofence.id.clone(),
        geofence.organization_id.clone(),
        geofence.name.clone(),
        geofence.center.latitude.to_string(),
        geofence.center.longitude.to_string(),
        geofence.radius_meters.to_string(),
        geofence.status.as_str().to_string(),
        geofence.schedule.enabled.to_string(),
        geofence
            .schedule
            .work_days
            .iter()
            .map(|day| day.to_string())
            .collect::<Vec<_>>()
            .join(";"),
        geofence.schedule.start.format("%H:%M").to_string(),
        geofence.schedule.end.format("%H:%M").to_string(),
        geofence.settings.entry_notification.to_string(),
        geofence.settings.exit_notification.to_string(),
        geofence.settings.auto_check_in.to_string(),
        geofence.settings.grace_period_minutes.to_string(),
        geofence.assigned_employee_ids.join(";"),
        geofence.created_at.to_rfc3339(),
        geofence.updated_at.to_rfc3339(),
    ]
}

fn parse_record(record: &csv::StringRecord) -> Result<GeofenceDefinition> {
    let field = |index: usize| record.get(index).unwrap_or("");

    let work_days = field(8)
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| anyhow!("invalid weekday in geofence record: {}", s))
        })
        .collect::<Result<Vec<_>>>()?;

    let assigned_employee_ids = field(15)
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    Ok(GeofenceDefinition {
        id: field(0).to_string(),
        organization_id: field(1).to_string(),
        name: field(2).to_string(),
        center: Coordinate::new(
            field(3).parse().context("invalid latitude in geofence record")?,
            field(4).parse().context("invalid longitude in geofence record")?,
        ),
        radius_meters: field(5)
            .parse()
            .context("invalid radius in geofence record")?,
        status: GeofenceStatus::from_str(field(6)).map_err(|e| anyhow!(e))?,
        schedule: GeofenceSchedule {
            enabled: field(7).parse().unwrap_or(false),
            work_days,
            start: parse_work_time(field(9))?,
            end: parse_work_time(field(10))?,
        },
        settings: GeofenceSettings {
            entry_notification: field(11).parse().unwrap_or(false),
            exit_notification: field(12).parse().unwrap_or(false),
            auto_check_in: field(13).parse().unwrap_or(false),
            grace_period_minutes: field(14).parse().unwrap_or(0),
        },
        assigned_employee_ids,
        created_at: parse_timestamp(field(16))?,
        updated_at: parse_timestamp(field(17))?,
    })
}

fn parse_work_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .with_context(|| format!("invalid work time in geofence record: {}", s))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in geofence record: {}", s))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_geofence(id: &str, organization_id: &str) -> GeofenceDefinition {
        let now = Utc::now();
        GeofenceDefinition {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            name: "Main office".to_string(),
            center: Coordinate::new(37.4419, -122.1430),
            radius_meters: 100.0,
            schedule: GeofenceSchedule {
                enabled: true,
                work_days: vec![Weekday::Mon, Weekday::Fri],
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            },
            settings: GeofenceSettings::default(),
            status: GeofenceStatus::Active,
            assigned_employee_ids: vec!["emp-1".to_string(), "emp-2".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    fn create_test_repository() -> (GeofenceRepository, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (GeofenceRepository::new(connection), temp_dir)
    }

    #[test]
    fn test_store_and_get_geofence() {
        let (repository, _temp_dir) = create_test_repository();
        let geofence = sample_geofence("geofence::1", "org-a");
        repository.store_geofence(&geofence).unwrap();

        let loaded = repository
            .get_geofence("org-a", "geofence::1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.name, "Main office");
        assert_eq!(loaded.schedule.work_days, vec![Weekday::Mon, Weekday::Fri]);
        assert_eq!(loaded.assigned_employee_ids.len(), 2);
        assert_eq!(loaded.status, GeofenceStatus::Active);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (repository, _temp_dir) = create_test_repository();
        let geofence = sample_geofence("geofence::1", "org-a");
        repository.store_geofence(&geofence).unwrap();
        assert!(repository.store_geofence(&geofence).is_err());
    }

    #[test]
    fn test_update_replaces_in_place() {
        let (repository, _temp_dir) = create_test_repository();
        let mut geofence = sample_geofence("geofence::1", "org-a");
        repository.store_geofence(&geofence).unwrap();

        geofence.status = GeofenceStatus::Inactive;
        repository.update_geofence(&geofence).unwrap();

        let loaded = repository
            .get_geofence("org-a", "geofence::1")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.status, GeofenceStatus::Inactive);
        assert_eq!(repository.list_geofences("org-a").unwrap().len(), 1);
    }

    #[test]
    fn test_update_missing_geofence_fails() {
        let (repository, _temp_dir) = create_test_repository();
        let geofence = sample_geofence("geofence::1", "org-a");
        assert!(repository.update_geofence(&geofence).is_err());
    }

    #[test]
    fn test_organizations_do_not_share_files() {
        let (repository, _temp_dir) = create_test_repository();
        repository
            .store_geofence(&sample_geofence("geofence::1", "org-a"))
            .unwrap();

        assert!(repository
            .get_geofence("org-b", "geofence::1")
            .unwrap()
            .is_none());
        assert!(repository.list_geofences("org-b").unwrap().is_empty());
    }
}
