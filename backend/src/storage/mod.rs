//! Storage layer: abstraction traits plus the CSV file implementation.

pub mod csv;
pub mod traits;

pub use csv::CsvConnection;
pub use traits::{AttendanceEventStorage, Connection, EmployeeStateStorage, GeofenceStorage};
