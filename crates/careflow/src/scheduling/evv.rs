//! Electronic Visit Verification transition rules.
//!
//! Pure decision logic for the per-visit lifecycle: the service fetches the
//! visit and its events, asks this module whether a transition is allowed,
//! and persists the effects. Location verification happens in the service
//! because it is an injected capability.

use chrono::{DateTime, Utc};

use super::domain::{CaregiverId, EvvEvent, Visit, VisitStatus};

/// Reasons the state machine refuses a transition. Each maps onto exactly one
/// entry of the service error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionDenied {
    #[error("visit is already closed ({0})")]
    VisitClosed(&'static str),
    #[error("no caregiver is assigned to this visit")]
    NoCaregiverAssigned,
    #[error("actor is not the caregiver assigned to this visit")]
    WrongCaregiver,
    #[error("already clocked in for this visit")]
    DuplicateClockIn,
    #[error("already clocked out for this visit")]
    DuplicateClockOut,
    #[error("cannot clock out without clocking in first")]
    ClockOutBeforeClockIn,
    #[error("clock-out timestamp must be after clock-in")]
    NonPositiveDuration,
    #[error("only scheduled or assigned visits can be cancelled")]
    NotCancellable,
    #[error("only assigned visits can be marked as a no-show")]
    NotNoShowable,
}

fn assigned_caregiver<'a>(
    visit: &'a Visit,
    actor: &CaregiverId,
) -> Result<&'a CaregiverId, TransitionDenied> {
    let assigned = visit
        .caregiver_id
        .as_ref()
        .ok_or(TransitionDenied::NoCaregiverAssigned)?;
    if assigned != actor {
        return Err(TransitionDenied::WrongCaregiver);
    }
    Ok(assigned)
}

/// Clock-in preconditions: no CLOCK_IN event exists yet, the visit is open,
/// and the actor is the assigned caregiver. The duplicate check runs before
/// the status gate so a repeated clock-in reports the existing event even
/// when the visit has since closed.
pub fn authorize_clock_in(
    visit: &Visit,
    actor: &CaregiverId,
    prior_clock_in: Option<&EvvEvent>,
) -> Result<(), TransitionDenied> {
    if prior_clock_in.is_some() {
        return Err(TransitionDenied::DuplicateClockIn);
    }
    if visit.status.is_terminal() {
        return Err(TransitionDenied::VisitClosed(visit.status.label()));
    }
    assigned_caregiver(visit, actor)?;
    Ok(())
}

/// Clock-out preconditions: no CLOCK_OUT yet, a CLOCK_IN exists, the actor is
/// the assigned caregiver, and the duration is strictly positive. The
/// duplicate check runs before the status gate so a repeated clock-out on a
/// completed visit reports the existing event. Returns the billable hours
/// for the verified interval.
pub fn authorize_clock_out(
    visit: &Visit,
    actor: &CaregiverId,
    clock_in: Option<&EvvEvent>,
    prior_clock_out: Option<&EvvEvent>,
    timestamp: DateTime<Utc>,
) -> Result<f64, TransitionDenied> {
    if prior_clock_out.is_some() {
        return Err(TransitionDenied::DuplicateClockOut);
    }
    if visit.status.is_terminal() {
        return Err(TransitionDenied::VisitClosed(visit.status.label()));
    }
    assigned_caregiver(visit, actor)?;
    let clock_in = clock_in.ok_or(TransitionDenied::ClockOutBeforeClockIn)?;
    if timestamp <= clock_in.timestamp {
        // A clock-out at or before the clock-in is a data-integrity error,
        // rejected rather than clamped.
        return Err(TransitionDenied::NonPositiveDuration);
    }
    Ok(billable_hours(clock_in.timestamp, timestamp))
}

/// Duration between verified events in hours, rounded to 2 decimal places.
pub fn billable_hours(clock_in: DateTime<Utc>, clock_out: DateTime<Utc>) -> f64 {
    let seconds = (clock_out - clock_in).num_seconds() as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

pub fn apply_clock_in(visit: &mut Visit, timestamp: DateTime<Utc>) {
    visit.status = VisitStatus::InProgress;
    visit.actual_start = Some(timestamp);
}

pub fn apply_clock_out(
    visit: &mut Visit,
    timestamp: DateTime<Utc>,
    billable: f64,
    completion_notes: Option<String>,
    client_signature: Option<String>,
) {
    visit.status = VisitStatus::Completed;
    visit.actual_end = Some(timestamp);
    visit.billable_hours = Some(billable);
    if completion_notes.is_some() {
        visit.caregiver_notes = completion_notes;
    }
    if client_signature.is_some() {
        visit.client_signature = client_signature;
    }
}

/// Explicit cancellation is only reachable before care starts.
pub fn authorize_cancel(visit: &Visit) -> Result<(), TransitionDenied> {
    match visit.status {
        VisitStatus::Scheduled | VisitStatus::Assigned => Ok(()),
        _ => Err(TransitionDenied::NotCancellable),
    }
}

/// No-show determinations are made upstream; the machine only accepts the
/// transition from the assigned state.
pub fn authorize_no_show(visit: &Visit) -> Result<(), TransitionDenied> {
    match visit.status {
        VisitStatus::Assigned => Ok(()),
        _ => Err(TransitionDenied::NotNoShowable),
    }
}
