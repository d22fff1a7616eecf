//! Attendance state machine.
//!
//! Every employee is in exactly one of three states: checked-out (initial),
//! checked-in, or on-break. Location pings drive the automatic transitions;
//! manual check-in/out and break requests drive the explicit ones. Each
//! transition is committed as one unit - a conditional state write followed
//! by a ledger append - so duplicate pings arriving together cannot both
//! check an employee in.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::commands::attendance::{
    BreakCommand, LocationPingCommand, LocationPingResult, ManualCheckInCommand,
    ManualCheckOutCommand,
};
use crate::domain::geo::Coordinate;
use crate::domain::geofence_service::GeofenceService;
use crate::domain::ledger_service::LedgerService;
use crate::domain::membership_service::MembershipService;
use crate::domain::models::attendance::{
    AttendanceEvent, AttendanceEventType, AttendanceStatus, EmployeeAttendanceState,
    MembershipResult, SessionMarker,
};
use crate::domain::models::errors::AttendanceError;
use crate::domain::models::geofence::GeofenceDefinition;
use crate::domain::notifier::AttendanceNotifier;
use crate::domain::tenancy::{TenantContext, TenantScope};
use crate::storage::csv::{CsvConnection, StateRepository};
use crate::storage::traits::EmployeeStateStorage;

/// How often a lost conditional write is retried before giving up.
const CONFLICT_RETRIES: usize = 1;

#[derive(Clone)]
pub struct AttendanceService {
    state_repository: StateRepository,
    geofence_service: GeofenceService,
    membership_service: MembershipService,
    ledger_service: LedgerService<CsvConnection>,
    notifier: Option<Arc<dyn AttendanceNotifier>>,
    /// One lock per employee: concurrent calls for the same employee are
    /// serialized, different employees proceed in parallel.
    employee_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl AttendanceService {
    pub fn new(
        connection: Arc<CsvConnection>,
        geofence_service: GeofenceService,
        membership_service: MembershipService,
        ledger_service: LedgerService<CsvConnection>,
    ) -> Self {
        Self {
            state_repository: StateRepository::new((*connection).clone()),
            geofence_service,
            membership_service,
            ledger_service,
            notifier: None,
            employee_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_notifier(
        connection: Arc<CsvConnection>,
        geofence_service: GeofenceService,
        membership_service: MembershipService,
        ledger_service: LedgerService<CsvConnection>,
        notifier: Arc<dyn AttendanceNotifier>,
    ) -> Self {
        let mut service = Self::new(
            connection,
            geofence_service,
            membership_service,
            ledger_service,
        );
        service.notifier = Some(notifier);
        service
    }

    /// Process a location ping: evaluate membership and apply whatever
    /// automatic transition the current state and geofence settings allow.
    /// A ping that changes nothing returns the state untouched and no
    /// events.
    pub fn handle_location_update(
        &self,
        ctx: &TenantContext,
        command: LocationPingCommand,
    ) -> Result<LocationPingResult> {
        command.location.validate()?;
        let scope = ctx.scope(Some(&command.organization_id))?;

        let lock = self.employee_lock(&command.employee_id);
        let _guard = lock.lock().expect("employee lock poisoned");

        let state = self.load_or_initial_state(&scope, &command.employee_id)?;
        let memberships = self.membership_service.evaluate(
            ctx,
            scope.organization_id(),
            Some(&command.employee_id),
            command.location,
        )?;

        match state.current_status {
            AttendanceStatus::CheckedOut => {
                self.try_auto_check_in(ctx, state, &memberships, &command)
            }
            AttendanceStatus::CheckedIn => {
                self.try_auto_check_out(ctx, state, &memberships, &command)
            }
            AttendanceStatus::OnBreak => {
                debug!(
                    "Employee {} is on break; location update ignored",
                    command.employee_id
                );
                Ok(LocationPingResult {
                    state,
                    events: Vec::new(),
                })
            }
        }
    }

    fn try_auto_check_in(
        &self,
        ctx: &TenantContext,
        state: EmployeeAttendanceState,
        memberships: &[MembershipResult],
        command: &LocationPingCommand,
    ) -> Result<LocationPingResult> {
        if !state.auto_check_in_enabled {
            return Ok(LocationPingResult {
                state,
                events: Vec::new(),
            });
        }

        // Memberships come back in ascending-distance order; the first
        // containing geofence with auto check-in enabled wins.
        for membership in memberships.iter().filter(|m| m.is_inside) {
            let geofence = self.geofence_service.get_geofence(
                ctx,
                &state.organization_id,
                &membership.geofence_id,
            )?;
            if !geofence.settings.auto_check_in {
                continue;
            }

            let event =
                build_check_in_event(&state, &geofence, command.location, command.timestamp);
            let new_state = checked_in_state(&state, &geofence.id, command.location, command.timestamp);
            let stored = self.commit_transition(
                ctx,
                state.current_status,
                &new_state,
                event,
                Some(&geofence),
            )?;
            info!(
                "Auto check-in of employee {} at geofence {}",
                command.employee_id, geofence.id
            );
            return Ok(LocationPingResult {
                state: new_state,
                events: vec![stored],
            });
        }

        Ok(LocationPingResult {
            state,
            events: Vec::new(),
        })
    }

    fn try_auto_check_out(
        &self,
        ctx: &TenantContext,
        state: EmployeeAttendanceState,
        memberships: &[MembershipResult],
        command: &LocationPingCommand,
    ) -> Result<LocationPingResult> {
        let Some(open) = state.last_check_in.clone() else {
            warn!(
                "Employee {} is checked in without a session marker; ignoring ping",
                command.employee_id
            );
            return Ok(LocationPingResult {
                state,
                events: Vec::new(),
            });
        };

        // A geofence missing from the candidate set is far outside it.
        let still_inside = memberships
            .iter()
            .find(|m| m.geofence_id == open.geofence_id)
            .map(|m| m.is_inside)
            .unwrap_or(false);
        if still_inside {
            // Re-entrant ping: same employee, same geofence, no new event.
            debug!(
                "Employee {} still inside geofence {}; no event",
                command.employee_id, open.geofence_id
            );
            return Ok(LocationPingResult {
                state,
                events: Vec::new(),
            });
        }

        if !state.auto_check_in_enabled {
            return Ok(LocationPingResult {
                state,
                events: Vec::new(),
            });
        }
        let geofence =
            self.geofence_service
                .get_geofence(ctx, &state.organization_id, &open.geofence_id)?;
        if !geofence.settings.auto_check_in {
            return Ok(LocationPingResult {
                state,
                events: Vec::new(),
            });
        }

        let event = build_check_out_event(
            &state,
            &open,
            &geofence.id,
            command.location,
            command.timestamp,
        );
        let new_state = checked_out_state(&state, &geofence.id, command.location, command.timestamp);
        let stored = self.commit_transition(
            ctx,
            state.current_status,
            &new_state,
            event,
            Some(&geofence),
        )?;
        info!(
            "Auto check-out of employee {} from geofence {}",
            command.employee_id, geofence.id
        );
        Ok(LocationPingResult {
            state: new_state,
            events: vec![stored],
        })
    }

    /// Explicit check-in. Bypasses the membership test (the actor vouches
    /// for the location) but not state legality or assignment.
    pub fn manual_check_in(
        &self,
        ctx: &TenantContext,
        command: ManualCheckInCommand,
    ) -> Result<AttendanceEvent> {
        command.location.validate()?;
        let scope = ctx.scope(Some(&command.organization_id))?;

        let lock = self.employee_lock(&command.employee_id);
        let _guard = lock.lock().expect("employee lock poisoned");

        let state = self.load_or_initial_state(&scope, &command.employee_id)?;
        if state.current_status != AttendanceStatus::CheckedOut {
            return Err(AttendanceError::InvalidTransition {
                reason: format!(
                    "employee {} is already {}",
                    command.employee_id,
                    state.current_status.as_str()
                ),
            }
            .into());
        }

        let geofence =
            self.geofence_service
                .get_geofence(ctx, &command.organization_id, &command.geofence_id)?;
        if !geofence.is_assigned(&command.employee_id) {
            return Err(AttendanceError::InvalidTransition {
                reason: format!(
                    "employee {} is not assigned to geofence {}",
                    command.employee_id, command.geofence_id
                ),
            }
            .into());
        }

        let event = build_check_in_event(&state, &geofence, command.location, command.timestamp);
        let new_state =
            checked_in_state(&state, &geofence.id, command.location, command.timestamp);
        let stored = self.commit_transition(
            ctx,
            state.current_status,
            &new_state,
            event,
            Some(&geofence),
        )?;
        info!(
            "Manual check-in of employee {} at geofence {} by actor {}",
            command.employee_id, command.geofence_id, command.actor_id
        );
        Ok(stored)
    }

    /// Explicit check-out against the geofence of the open session.
    pub fn manual_check_out(
        &self,
        ctx: &TenantContext,
        command: ManualCheckOutCommand,
    ) -> Result<AttendanceEvent> {
        command.location.validate()?;
        let scope = ctx.scope(Some(&command.organization_id))?;

        let lock = self.employee_lock(&command.employee_id);
        let _guard = lock.lock().expect("employee lock poisoned");

        let state = self.load_or_initial_state(&scope, &command.employee_id)?;
        if state.current_status != AttendanceStatus::CheckedIn {
            return Err(AttendanceError::InvalidTransition {
                reason: "check-out without matching check-in".to_string(),
            }
            .into());
        }
        let Some(open) = state.last_check_in.clone() else {
            return Err(AttendanceError::InvalidTransition {
                reason: "check-out without matching check-in".to_string(),
            }
            .into());
        };
        if open.geofence_id != command.geofence_id {
            return Err(AttendanceError::InvalidTransition {
                reason: format!(
                    "check-out without matching check-in for geofence {}",
                    command.geofence_id
                ),
            }
            .into());
        }

        let geofence =
            self.geofence_service
                .get_geofence(ctx, &command.organization_id, &command.geofence_id)?;
        let event = build_check_out_event(
            &state,
            &open,
            &geofence.id,
            command.location,
            command.timestamp,
        );
        let new_state =
            checked_out_state(&state, &geofence.id, command.location, command.timestamp);
        let stored = self.commit_transition(
            ctx,
            state.current_status,
            &new_state,
            event,
            Some(&geofence),
        )?;
        info!(
            "Manual check-out of employee {} from geofence {} by actor {}",
            command.employee_id, command.geofence_id, command.actor_id
        );
        Ok(stored)
    }

    /// Pause the open session.
    pub fn start_break(&self, ctx: &TenantContext, command: BreakCommand) -> Result<AttendanceEvent> {
        self.apply_break(
            ctx,
            command,
            AttendanceStatus::CheckedIn,
            AttendanceStatus::OnBreak,
            AttendanceEventType::BreakStart,
        )
    }

    /// Resume the open session.
    pub fn end_break(&self, ctx: &TenantContext, command: BreakCommand) -> Result<AttendanceEvent> {
        self.apply_break(
            ctx,
            command,
            AttendanceStatus::OnBreak,
            AttendanceStatus::CheckedIn,
            AttendanceEventType::BreakEnd,
        )
    }

    fn apply_break(
        &self,
        ctx: &TenantContext,
        command: BreakCommand,
        required: AttendanceStatus,
        next: AttendanceStatus,
        event_type: AttendanceEventType,
    ) -> Result<AttendanceEvent> {
        command.location.validate()?;
        let scope = ctx.scope(Some(&command.organization_id))?;

        let lock = self.employee_lock(&command.employee_id);
        let _guard = lock.lock().expect("employee lock poisoned");

        let state = self.load_or_initial_state(&scope, &command.employee_id)?;
        if state.current_status != required {
            return Err(AttendanceError::InvalidTransition {
                reason: format!(
                    "{} requires status {}, employee {} is {}",
                    event_type.as_str(),
                    required.as_str(),
                    command.employee_id,
                    state.current_status.as_str()
                ),
            }
            .into());
        }
        let Some(open) = state.last_check_in.clone() else {
            return Err(AttendanceError::InvalidTransition {
                reason: format!("{} without an open session", event_type.as_str()),
            }
            .into());
        };

        let event = AttendanceEvent {
            id: String::new(),
            employee_id: state.employee_id.clone(),
            organization_id: state.organization_id.clone(),
            geofence_id: open.geofence_id.clone(),
            event_type,
            timestamp: command.timestamp,
            location: command.location,
            is_on_time: None,
            late_minutes: None,
            total_hours: None,
        };
        let mut new_state = state.clone();
        new_state.current_status = next;
        new_state.updated_at = Utc::now();

        let stored =
            self.commit_transition(ctx, state.current_status, &new_state, event, None)?;
        info!(
            "{} for employee {} in geofence {}",
            event_type.as_str(),
            command.employee_id,
            open.geofence_id
        );
        Ok(stored)
    }

    /// Commit a transition as one unit: conditional state write keyed on
    /// the status the decision was based on, then the ledger append. A lost
    /// write is retried once, then surfaced as a transient conflict.
    fn commit_transition(
        &self,
        ctx: &TenantContext,
        expected: AttendanceStatus,
        new_state: &EmployeeAttendanceState,
        event: AttendanceEvent,
        geofence: Option<&GeofenceDefinition>,
    ) -> Result<AttendanceEvent> {
        let mut attempts = 0;
        loop {
            if self
                .state_repository
                .update_state_if_status(expected, new_state)?
            {
                break;
            }
            attempts += 1;
            if attempts > CONFLICT_RETRIES {
                return Err(AttendanceError::ConcurrentModification {
                    employee_id: new_state.employee_id.clone(),
                }
                .into());
            }
            warn!(
                "Conditional state update conflict for employee {}, retrying",
                new_state.employee_id
            );
        }

        let stored = self.ledger_service.append(ctx, event)?;
        self.dispatch_notification(&stored, geofence);
        Ok(stored)
    }

    fn dispatch_notification(
        &self,
        event: &AttendanceEvent,
        geofence: Option<&GeofenceDefinition>,
    ) {
        let wanted = match event.event_type {
            AttendanceEventType::CheckIn => geofence
                .map(|g| g.settings.entry_notification)
                .unwrap_or(true),
            AttendanceEventType::CheckOut => geofence
                .map(|g| g.settings.exit_notification)
                .unwrap_or(true),
            AttendanceEventType::BreakStart | AttendanceEventType::BreakEnd => true,
        };
        if !wanted {
            return;
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify(&event.employee_id, event) {
                error!("Failed to deliver notification for event {}: {}", event.id, e);
            }
        }
    }

    /// Current state of an employee, defaulting to checked-out for an
    /// employee the engine has never seen.
    pub fn current_state(
        &self,
        ctx: &TenantContext,
        organization_id: &str,
        employee_id: &str,
    ) -> Result<EmployeeAttendanceState> {
        let scope = ctx.scope(Some(organization_id))?;
        self.load_or_initial_state(&scope, employee_id)
    }

    fn load_or_initial_state(
        &self,
        scope: &TenantScope,
        employee_id: &str,
    ) -> Result<EmployeeAttendanceState> {
        match self
            .state_repository
            .get_state(scope.organization_id(), employee_id)?
        {
            Some(state) => Ok(state),
            None => Ok(EmployeeAttendanceState::initial(
                scope.organization_id(),
                employee_id,
                Utc::now(),
            )),
        }
    }

    fn employee_lock(&self, employee_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.employee_locks.lock().expect("employee lock table poisoned");
        locks
            .entry(employee_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Lateness of a check-in against the geofence schedule, after the grace
/// period. Days outside the schedule are never late.
fn lateness(geofence: &GeofenceDefinition, timestamp: DateTime<Utc>) -> (bool, i64) {
    let schedule = &geofence.schedule;
    if !schedule.applies_on(timestamp.weekday()) {
        return (true, 0);
    }
    let scheduled_start = timestamp.date_naive().and_time(schedule.start).and_utc();
    let raw_minutes = (timestamp - scheduled_start).num_minutes().max(0);
    let late_minutes = (raw_minutes - geofence.settings.grace_period_minutes as i64).max(0);
    (late_minutes == 0, late_minutes)
}

/// Worked hours between check-in and check-out, rounded to 2 decimals and
/// clamped to zero when clocks disagree.
fn total_hours(check_in: DateTime<Utc>, check_out: DateTime<Utc>, employee_id: &str) -> f64 {
    let seconds = (check_out - check_in).num_seconds();
    if seconds < 0 {
        warn!(
            "Check-out before check-in for employee {}; clamping hours to zero (clock skew)",
            employee_id
        );
        return 0.0;
    }
    let hours = seconds as f64 / 3600.0;
    (hours * 100.0).round() / 100.0
}

fn build_check_in_event(
    state: &EmployeeAttendanceState,
    geofence: &GeofenceDefinition,
    location: Coordinate,
    timestamp: DateTime<Utc>,
) -> AttendanceEvent {
    let (is_on_time, late_minutes) = lateness(geofence, timestamp);
    AttendanceEvent {
        id: String::new(),
        employee_id: state.employee_id.clone(),
        organization_id: state.organization_id.clone(),
        geofence_id: geofence.id.clone(),
        event_type: AttendanceEventType::CheckIn,
        timestamp,
        location,
        is_on_time: Some(is_on_time),
        late_minutes: Some(late_minutes),
        total_hours: None,
    }
}

fn build_check_out_event(
    state: &EmployeeAttendanceState,
    open: &SessionMarker,
    geofence_id: &str,
    location: Coordinate,
    timestamp: DateTime<Utc>,
) -> AttendanceEvent {
    AttendanceEvent {
        id: String::new(),
        employee_id: state.employee_id.clone(),
        organization_id: state.organization_id.clone(),
        geofence_id: geofence_id.to_string(),
        event_type: AttendanceEventType::CheckOut,
        timestamp,
        location,
        is_on_time: None,
        late_minutes: None,
        total_hours: Some(total_hours(open.timestamp, timestamp, &state.employee_id)),
    }
}

fn checked_in_state(
    previous: &EmployeeAttendanceState,
    geofence_id: &str,
    location: Coordinate,
    timestamp: DateTime<Utc>,
) -> EmployeeAttendanceState {
    let mut state = previous.clone();
    state.current_status = AttendanceStatus::CheckedIn;
    state.last_check_in = Some(SessionMarker {
        timestamp,
        geofence_id: geofence_id.to_string(),
        location,
    });
    state.updated_at = Utc::now();
    state
}

fn checked_out_state(
    previous: &EmployeeAttendanceState,
    geofence_id: &str,
    location: Coordinate,
    timestamp: DateTime<Utc>,
) -> EmployeeAttendanceState {
    let mut state = previous.clone();
    state.current_status = AttendanceStatus::CheckedOut;
    state.last_check_out = Some(SessionMarker {
        timestamp,
        geofence_id: geofence_id.to_string(),
        location,
    });
    state.updated_at = Utc::now();
    state
}
