//! Domain layer: models, commands, and the attendance services.

pub mod attendance_service;
pub mod commands;
pub mod geo;
pub mod geofence_service;
pub mod ledger_service;
pub mod membership_service;
pub mod models;
pub mod notifier;
pub mod tenancy;

pub use attendance_service::AttendanceService;
pub use geofence_service::GeofenceService;
pub use ledger_service::LedgerService;
pub use membership_service::MembershipService;
pub use notifier::{AttendanceNotifier, LogNotifier};
pub use tenancy::TenantContext;
