//! Append-only attendance ledger with derived aggregates.
//!
//! Events are immutable once written. Lateness and duration are stored on
//! the events themselves at transition time; the aggregates here are a
//! single-pass fold over those stored fields, so a caller can always
//! recompute them from the same query.

use anyhow::{anyhow, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::domain::commands::attendance::{AttendanceStats, EventRangeQuery};
use crate::domain::models::attendance::{AttendanceEvent, AttendanceEventType};
use crate::domain::tenancy::TenantContext;
use crate::storage::traits::{AttendanceEventStorage, Connection};

const MAX_ID_ATTEMPTS: usize = 5;

/// Service owning all reads and writes of the attendance event ledger
#[derive(Clone)]
pub struct LedgerService<C: Connection> {
    event_repository: C::EventRepository,
}

impl<C: Connection> LedgerService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        let event_repository = connection.create_event_repository();
        Self { event_repository }
    }

    /// Append one event, assigning an id when the caller left it empty.
    /// Returns the stored record.
    pub fn append(
        &self,
        ctx: &TenantContext,
        mut event: AttendanceEvent,
    ) -> Result<AttendanceEvent> {
        let scope = ctx.scope(Some(&event.organization_id))?;

        if event.id.is_empty() {
            event.id = self.unique_event_id(
                scope.organization_id(),
                event.event_type,
                event.timestamp.timestamp_millis(),
            )?;
        }
        self.event_repository.append_event(&event)?;
        info!(
            "Appended {} event {} for employee {}",
            event.event_type.as_str(),
            event.id,
            event.employee_id
        );
        Ok(event)
    }

    /// Generate an id that is unused within the organization. Retries are
    /// bounded; sustained collisions fail instead of recursing forever.
    fn unique_event_id(
        &self,
        organization_id: &str,
        event_type: AttendanceEventType,
        timestamp_millis: i64,
    ) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = AttendanceEvent::generate_id(event_type, timestamp_millis);
            if !self.event_repository.event_id_exists(organization_id, &id)? {
                return Ok(id);
            }
        }
        Err(anyhow!(
            "could not generate a unique event id after {} attempts",
            MAX_ID_ATTEMPTS
        ))
    }

    /// Events of one employee ordered by timestamp ascending. Re-querying
    /// yields the same sequence unless new events were appended.
    pub fn events_for_employee(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: &str,
        query: &EventRangeQuery,
    ) -> Result<Vec<AttendanceEvent>> {
        let scope = ctx.scope(Some(organization_id))?;
        self.event_repository.list_events(
            scope.organization_id(),
            Some(employee_id),
            query.from,
            query.to,
        )
    }

    /// Single-pass stats fold over every event of one organization
    pub fn aggregate_for_organization(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        query: &EventRangeQuery,
    ) -> Result<AttendanceStats> {
        let scope = ctx.scope(Some(organization_id))?;
        let events = self.event_repository.list_events(
            scope.organization_id(),
            None,
            query.from,
            query.to,
        )?;
        Ok(fold_stats(&events))
    }

    /// Single-pass stats fold over one employee's events
    pub fn aggregate_for_employee(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: &str,
        query: &EventRangeQuery,
    ) -> Result<AttendanceStats> {
        let events = self.events_for_employee(ctx, organization_id, employee_id, query)?;
        Ok(fold_stats(&events))
    }

    /// Diagnostic: recompute each check-out's total hours against its
    /// matching check-in and report every mismatch. An empty result means
    /// the ledger is internally consistent for this employee.
    pub fn validate_sessions(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: &str,
    ) -> Result<Vec<String>> {
        let events = self.events_for_employee(
            ctx,
            organization_id,
            employee_id,
            &EventRangeQuery::default(),
        )?;

        let mut errors = Vec::new();
        let mut open_check_in: Option<&AttendanceEvent> = None;

        for event in &events {
            match event.event_type {
                AttendanceEventType::CheckIn => {
                    if open_check_in.is_some() {
                        errors.push(format!(
                            "check-in {} while a session is already open",
                            event.id
                        ));
                    }
                    open_check_in = Some(event);
                }
                AttendanceEventType::CheckOut => match open_check_in.take() {
                    Some(check_in) => {
                        let seconds = (event.timestamp - check_in.timestamp).num_seconds();
                        let expected =
                            ((seconds.max(0) as f64 / 3600.0) * 100.0).round() / 100.0;
                        let stored = event.total_hours.unwrap_or(0.0);
                        if (stored - expected).abs() > 0.01 {
                            errors.push(format!(
                                "check-out {} has total_hours {:.2}, expected {:.2}",
                                event.id, stored, expected
                            ));
                        }
                    }
                    None => {
                        errors.push(format!(
                            "check-out {} has no matching check-in",
                            event.id
                        ));
                    }
                },
                AttendanceEventType::BreakStart | AttendanceEventType::BreakEnd => {}
            }
        }

        if errors.is_empty() {
            info!("Ledger sessions are consistent for employee {}", employee_id);
        } else {
            warn!(
                "Found {} ledger inconsistencies for employee {}",
                errors.len(),
                employee_id
            );
        }
        Ok(errors)
    }
}

fn fold_stats(events: &[AttendanceEvent]) -> AttendanceStats {
    let mut stats = AttendanceStats::default();
    for event in events {
        stats.count += 1;
        match event.event_type {
            AttendanceEventType::CheckIn => {
                match event.is_on_time {
                    Some(true) => stats.on_time_count += 1,
                    Some(false) => stats.late_count += 1,
                    None => {}
                }
                stats.total_late_minutes += event.late_minutes.unwrap_or(0);
            }
            AttendanceEventType::CheckOut => {
                stats.total_hours += event.total_hours.unwrap_or(0.0);
            }
            AttendanceEventType::BreakStart | AttendanceEventType::BreakEnd => {}
        }
    }
    stats
}
