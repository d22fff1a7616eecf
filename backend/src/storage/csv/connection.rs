//! Connection to the CSV data directory.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use super::{EventRepository, GeofenceRepository, StateRepository};
use crate::storage::traits::Connection;

/// Handle on the data directory all repositories read and write under.
#[derive(Debug, Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Open (creating if necessary) the data directory.
    pub fn new(base_directory: impl AsRef<Path>) -> Result<Self> {
        let base_directory = base_directory.as_ref().to_path_buf();
        fs::create_dir_all(&base_directory)?;
        Ok(Self { base_directory })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Directory holding one organization's files, created on demand.
    pub fn ensure_organization_dir(&self, organization_id: &str) -> Result<PathBuf> {
        let dir = self.organization_dir(organization_id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn geofences_file_path(&self, organization_id: &str) -> PathBuf {
        self.organization_dir(organization_id).join("geofences.csv")
    }

    pub fn events_file_path(&self, organization_id: &str) -> PathBuf {
        self.organization_dir(organization_id).join("events.csv")
    }

    pub fn states_file_path(&self, organization_id: &str) -> PathBuf {
        self.organization_dir(organization_id)
            .join("employee_states.csv")
    }

    fn organization_dir(&self, organization_id: &str) -> PathBuf {
        self.base_directory
            .join(safe_directory_name(organization_id))
    }
}

impl Connection for CsvConnection {
    type GeofenceRepository = GeofenceRepository;
    type EventRepository = EventRepository;
    type StateRepository = StateRepository;

    fn create_geofence_repository(&self) -> GeofenceRepository {
        GeofenceRepository::new(self.clone())
    }

    fn create_event_repository(&self) -> EventRepository {
        EventRepository::new(self.clone())
    }

    fn create_state_repository(&self) -> StateRepository {
        StateRepository::new(self.clone())
    }
}

/// Filesystem-safe directory name for an organization id.
fn safe_directory_name(organization_id: &str) -> String {
    organization_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .to_lowercase()
}
