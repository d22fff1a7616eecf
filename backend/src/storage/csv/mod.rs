//! # CSV Storage Module
//!
//! CSV-file storage implementation for the attendance engine. Every
//! organization gets its own subdirectory under the data directory, so one
//! tenant's files never share a path with another tenant's:
//!
//! ```text
//! <data_dir>/<organization_id>/geofences.csv
//! <data_dir>/<organization_id>/events.csv
//! <data_dir>/<organization_id>/employee_states.csv
//! ```
//!
//! Geofence definitions and employee states are whole-file read / truncate
//! rewrite tables; the event ledger is append-only and is never rewritten.

pub mod connection;
pub mod event_repository;
pub mod geofence_repository;
pub mod state_repository;

pub use connection::CsvConnection;
pub use event_repository::EventRepository;
pub use geofence_repository::GeofenceRepository;
pub use state_repository::StateRepository;
