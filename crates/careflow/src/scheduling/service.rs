use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{info, warn};

use super::conflict;
use super::domain::{
    BulkScheduleOutcome, BulkScheduleRequest, CancelVisitRequest, CancellationOutcome, CaregiverId,
    ClockInRequest, ClockOutOutcome, ClockOutRequest, ConflictQuery, EvvEvent, EvvEventKind,
    MatchRequest, MatchResult, NewVisit, NoShowParty, ScheduleConflict, TaskUpdate, Visit, VisitId,
    VisitStats, VisitStatsQuery, VisitStatus, VisitUpdate,
};
use super::evv::{self, TransitionDenied};
use super::matching::CaregiverMatcher;
use super::recurrence;
use super::repository::{
    CareDirectory, DirectoryError, DistanceScorer, LocationVerifier, RepositoryError,
    VerificationError, VisitQuery, VisitRepository,
};

/// Number of created visits echoed back from a bulk operation.
const BULK_PREVIEW: usize = 10;

static VISIT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_visit_id() -> VisitId {
    let id = VISIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    VisitId(format!("visit-{id:06}"))
}

/// Orchestrator for visit scheduling and verification. Composes the conflict
/// detector, the EVV state machine, the matching engine, and the recurrence
/// expander over injected storage and capability traits.
pub struct VisitScheduler<R, D, V> {
    repository: Arc<R>,
    directory: Arc<D>,
    verifier: Arc<V>,
    matcher: CaregiverMatcher,
}

impl<R, D, V> VisitScheduler<R, D, V>
where
    R: VisitRepository + 'static,
    D: CareDirectory + 'static,
    V: LocationVerifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        verifier: Arc<V>,
        distance: Arc<dyn DistanceScorer>,
    ) -> Self {
        Self {
            repository,
            directory,
            verifier,
            matcher: CaregiverMatcher::new(distance),
        }
    }

    /// Schedule a single visit, failing closed on any caregiver conflict.
    /// A recurrence pattern materializes the remaining occurrences through
    /// the best-effort bulk path.
    pub fn create_visit(&self, new: NewVisit) -> Result<Visit, SchedulingError> {
        validate_interval(new.scheduled_start, new.scheduled_end)?;
        // The pattern's daily window is checked up front so an invalid
        // recurrence writes nothing.
        if let Some(pattern) = &new.recurrence {
            if pattern.end_time <= pattern.start_time {
                return Err(SchedulingError::InvalidInterval);
            }
        }

        let conflicts = self.find_conflicts(
            new.caregiver_id.as_ref(),
            new.scheduled_start,
            new.scheduled_end,
            None,
        )?;
        if !conflicts.is_empty() {
            warn!(
                caregiver = new.caregiver_id.as_ref().map(|id| id.0.as_str()),
                conflicts = conflicts.len(),
                "visit creation refused: caregiver double-booked"
            );
            return Err(SchedulingError::ScheduleConflict { conflicts });
        }

        let recurrence = new.recurrence.clone();
        let assigned = new.caregiver_id.is_some();
        let visit = Visit {
            id: next_visit_id(),
            client_id: new.client_id,
            caregiver_id: new.caregiver_id,
            scheduled_start: new.scheduled_start,
            scheduled_end: new.scheduled_end,
            actual_start: None,
            actual_end: None,
            status: initial_status(assigned),
            visit_type: new.visit_type,
            billable_hours: None,
            tasks: new.tasks.iter().cloned().map(|t| t.into_task()).collect(),
            special_instructions: new.special_instructions,
            caregiver_notes: None,
            client_signature: None,
            cancellation_notes: None,
            is_recurring: recurrence.is_some(),
            recurrence: recurrence.clone(),
        };

        let stored = self.repository.insert(visit)?;

        if let Some(pattern) = recurrence {
            let first_date = stored.scheduled_start.date_naive();
            let dates: Vec<NaiveDate> = recurrence::expand(
                first_date,
                pattern.until,
                &pattern.days_of_week,
                &Default::default(),
            )
            .into_iter()
            .filter(|date| *date != first_date)
            .collect();

            let created = self.materialize_occurrences(
                &stored,
                &dates,
                pattern.start_time,
                pattern.end_time,
            )?;
            info!(
                visit = %stored.id.0,
                occurrences = created,
                "recurring visit expanded"
            );
        }

        Ok(stored)
    }

    /// Apply a partial update, re-validating conflicts whenever the time
    /// window or caregiver changes.
    pub fn update_visit(
        &self,
        visit_id: &VisitId,
        update: VisitUpdate,
    ) -> Result<Visit, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        if visit.status.is_terminal() {
            return Err(TransitionDenied::VisitClosed(visit.status.label()).into());
        }

        let reschedules = update.scheduled_start.is_some()
            || update.scheduled_end.is_some()
            || update.caregiver_id.is_some();

        let caregiver = update
            .caregiver_id
            .clone()
            .or_else(|| visit.caregiver_id.clone());
        let start = update.scheduled_start.unwrap_or(visit.scheduled_start);
        let end = update.scheduled_end.unwrap_or(visit.scheduled_end);
        validate_interval(start, end)?;

        if reschedules {
            let conflicts = self.find_conflicts(caregiver.as_ref(), start, end, Some(visit_id))?;
            if !conflicts.is_empty() {
                warn!(visit = %visit_id.0, conflicts = conflicts.len(), "visit update refused");
                return Err(SchedulingError::ScheduleConflict { conflicts });
            }
        }

        let newly_assigned = visit.caregiver_id.is_none() && caregiver.is_some();
        visit.caregiver_id = caregiver;
        visit.scheduled_start = start;
        visit.scheduled_end = end;
        if let Some(visit_type) = update.visit_type {
            visit.visit_type = visit_type;
        }
        if update.special_instructions.is_some() {
            visit.special_instructions = update.special_instructions;
        }
        if newly_assigned && visit.status == VisitStatus::Scheduled {
            visit.status = VisitStatus::Assigned;
        }

        self.repository.update(visit.clone())?;
        Ok(visit)
    }

    /// Cancel a visit before care starts, optionally scheduling a
    /// replacement. The replacement goes through the normal conflict-checked
    /// create path.
    pub fn cancel_visit(
        &self,
        visit_id: &VisitId,
        request: CancelVisitRequest,
    ) -> Result<CancellationOutcome, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        evv::authorize_cancel(&visit)?;

        // The replacement is validated first; a refused reschedule must
        // leave the original visit untouched.
        let replacement_slot = match request.reschedule {
            Some(reschedule) => {
                let caregiver = reschedule
                    .alternative_caregiver
                    .or_else(|| visit.caregiver_id.clone());
                let start = instant(reschedule.proposed_date, reschedule.start_time);
                let end = instant(reschedule.proposed_date, reschedule.end_time);
                validate_interval(start, end)?;
                let conflicts =
                    self.find_conflicts(caregiver.as_ref(), start, end, Some(visit_id))?;
                if !conflicts.is_empty() {
                    warn!(
                        visit = %visit_id.0,
                        conflicts = conflicts.len(),
                        "reschedule refused: caregiver double-booked"
                    );
                    return Err(SchedulingError::ScheduleConflict { conflicts });
                }
                Some((caregiver, start, end))
            }
            None => None,
        };

        visit.status = VisitStatus::Cancelled;
        if request.notes.is_some() {
            visit.cancellation_notes = request.notes.clone();
        }
        self.repository.update(visit.clone())?;
        info!(visit = %visit_id.0, reason = ?request.reason, "visit cancelled");

        let replacement = match replacement_slot {
            Some((caregiver, start, end)) => {
                let new_visit = NewVisit {
                    client_id: visit.client_id.clone(),
                    caregiver_id: caregiver,
                    scheduled_start: start,
                    scheduled_end: end,
                    visit_type: visit.visit_type,
                    special_instructions: visit.special_instructions.clone(),
                    tasks: Vec::new(),
                    recurrence: None,
                };
                Some(self.create_visit(new_visit)?)
            }
            None => None,
        };

        Ok(CancellationOutcome {
            cancelled: visit,
            replacement,
        })
    }

    /// Record an externally decided no-show.
    pub fn mark_no_show(
        &self,
        visit_id: &VisitId,
        party: NoShowParty,
    ) -> Result<Visit, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        evv::authorize_no_show(&visit)?;

        visit.status = match party {
            NoShowParty::Client => VisitStatus::NoShowClient,
            NoShowParty::Caregiver => VisitStatus::NoShowCaregiver,
        };
        self.repository.update(visit.clone())?;
        Ok(visit)
    }

    /// Verified clock-in: assignment check, single-event check, geofence.
    pub fn clock_in(
        &self,
        visit_id: &VisitId,
        request: ClockInRequest,
    ) -> Result<EvvEvent, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        let prior = self
            .repository
            .find_event(visit_id, EvvEventKind::ClockIn)?;
        evv::authorize_clock_in(&visit, &request.caregiver_id, prior.as_ref())?;

        self.verify_location(&visit, request.latitude, request.longitude)?;

        let event = EvvEvent {
            visit_id: visit_id.clone(),
            kind: EvvEventKind::ClockIn,
            timestamp: request.timestamp,
            latitude: request.latitude,
            longitude: request.longitude,
            device_id: request.device_id,
        };
        self.repository.insert_event(event.clone())?;
        evv::apply_clock_in(&mut visit, request.timestamp);
        self.repository.update(visit)?;

        info!(visit = %visit_id.0, caregiver = %request.caregiver_id.0, "clock-in recorded");
        Ok(event)
    }

    /// Verified clock-out: computes billable hours and completes the visit.
    pub fn clock_out(
        &self,
        visit_id: &VisitId,
        request: ClockOutRequest,
    ) -> Result<ClockOutOutcome, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        let clock_in = self
            .repository
            .find_event(visit_id, EvvEventKind::ClockIn)?;
        let prior_out = self
            .repository
            .find_event(visit_id, EvvEventKind::ClockOut)?;
        let billable = evv::authorize_clock_out(
            &visit,
            &request.caregiver_id,
            clock_in.as_ref(),
            prior_out.as_ref(),
            request.timestamp,
        )?;

        self.verify_location(&visit, request.latitude, request.longitude)?;

        let event = EvvEvent {
            visit_id: visit_id.clone(),
            kind: EvvEventKind::ClockOut,
            timestamp: request.timestamp,
            latitude: request.latitude,
            longitude: request.longitude,
            device_id: request.device_id,
        };
        self.repository.insert_event(event.clone())?;
        evv::apply_clock_out(
            &mut visit,
            request.timestamp,
            billable,
            request.completion_notes,
            request.client_signature,
        );
        self.repository.update(visit)?;

        info!(visit = %visit_id.0, billable_hours = billable, "clock-out recorded");
        Ok(ClockOutOutcome {
            event,
            billable_hours: billable,
        })
    }

    /// Bulk-update the visit's task checklist. When an acting caregiver is
    /// supplied they must be the assigned caregiver; staff callers pass
    /// `None` (authorization policy lives upstream).
    pub fn update_tasks(
        &self,
        visit_id: &VisitId,
        actor: Option<&CaregiverId>,
        updates: &[TaskUpdate],
    ) -> Result<Visit, SchedulingError> {
        let mut visit = self.fetch_visit(visit_id)?;
        if let Some(actor) = actor {
            if visit.caregiver_id.as_ref() != Some(actor) {
                return Err(TransitionDenied::WrongCaregiver.into());
            }
        }

        for update in updates {
            let task = visit
                .tasks
                .get_mut(update.index)
                .ok_or(SchedulingError::UnknownTask(update.index))?;
            task.completed = update.completed;
            if update.notes.is_some() {
                task.notes = update.notes.clone();
            }
            task.completed_at = update.completed_at;
        }

        self.repository.update(visit.clone())?;
        Ok(visit)
    }

    /// Standalone conflict probe over a candidate window.
    pub fn check_conflicts(
        &self,
        query: &ConflictQuery,
    ) -> Result<Vec<ScheduleConflict>, SchedulingError> {
        validate_interval(query.scheduled_start, query.scheduled_end)?;
        self.find_conflicts(
            query.caregiver_id.as_ref(),
            query.scheduled_start,
            query.scheduled_end,
            query.exclude_visit_id.as_ref(),
        )
    }

    /// Best-effort bulk scheduling: conflicting dates are skipped silently,
    /// and each acceptance is visible to the conflict check for the next
    /// date. Returns the count and a preview of created visits.
    pub fn create_bulk_schedule(
        &self,
        request: BulkScheduleRequest,
    ) -> Result<BulkScheduleOutcome, SchedulingError> {
        if request.end_time <= request.start_time {
            return Err(SchedulingError::InvalidInterval);
        }

        let dates = recurrence::expand(
            request.period.start_date,
            request.period.end_date,
            &request.days_of_week,
            &request.exclude_dates,
        );

        let mut created = Vec::new();
        for date in dates {
            let start = instant(date, request.start_time);
            let end = instant(date, request.end_time);

            let conflicts =
                self.find_conflicts(request.caregiver_id.as_ref(), start, end, None)?;
            if !conflicts.is_empty() {
                info!(%date, "bulk schedule: date skipped due to conflict");
                continue;
            }

            let visit = Visit {
                id: next_visit_id(),
                client_id: request.client_id.clone(),
                caregiver_id: request.caregiver_id.clone(),
                scheduled_start: start,
                scheduled_end: end,
                actual_start: None,
                actual_end: None,
                status: initial_status(request.caregiver_id.is_some()),
                visit_type: request.visit_type,
                billable_hours: None,
                tasks: request
                    .tasks
                    .iter()
                    .cloned()
                    .map(|t| t.into_task())
                    .collect(),
                special_instructions: request.special_instructions.clone(),
                caregiver_notes: None,
                client_signature: None,
                cancellation_notes: None,
                is_recurring: true,
                recurrence: None,
            };
            created.push(self.repository.insert(visit)?);
        }

        let created_count = created.len();
        created.truncate(BULK_PREVIEW);
        Ok(BulkScheduleOutcome {
            created_count,
            visits: created,
        })
    }

    /// Rank caregiver candidates for a client. Deterministic for identical
    /// inputs; returns at most ten results.
    pub fn rank_caregivers(
        &self,
        request: &MatchRequest,
    ) -> Result<Vec<MatchResult>, SchedulingError> {
        if self.directory.client(&request.client_id)?.is_none() {
            return Err(SchedulingError::ClientNotFound);
        }
        let pool = self.directory.caregiver_pool(request)?;
        Ok(self.matcher.rank(request, &pool))
    }

    /// Aggregate visit statistics over a typed filter.
    pub fn visit_stats(&self, query: &VisitStatsQuery) -> Result<VisitStats, SchedulingError> {
        let visits = self.repository.list(&VisitQuery {
            client_id: query.client_id.clone(),
            caregiver_id: query.caregiver_id.clone(),
            scheduled_from: query.date_range.map(|range| range.from),
            scheduled_to: query.date_range.map(|range| range.to),
        })?;

        let total_visits = visits.len();
        let completed_visits = visits
            .iter()
            .filter(|v| v.status == VisitStatus::Completed)
            .count();
        let cancelled_visits = visits
            .iter()
            .filter(|v| v.status == VisitStatus::Cancelled)
            .count();
        let no_show_visits = visits
            .iter()
            .filter(|v| {
                matches!(
                    v.status,
                    VisitStatus::NoShowClient | VisitStatus::NoShowCaregiver
                )
            })
            .count();
        let total_billable_hours: f64 = visits
            .iter()
            .filter(|v| v.status == VisitStatus::Completed)
            .filter_map(|v| v.billable_hours)
            .sum();

        let average_visit_duration = if completed_visits > 0 {
            total_billable_hours / completed_visits as f64
        } else {
            0.0
        };
        let completion_rate = if total_visits > 0 {
            completed_visits as f64 / total_visits as f64 * 100.0
        } else {
            0.0
        };
        let punctuality_rate = if completed_visits > 0 {
            completed_visits as f64 / total_visits as f64 * 100.0
        } else {
            0.0
        };

        Ok(VisitStats {
            total_visits,
            completed_visits,
            cancelled_visits,
            no_show_visits,
            total_billable_hours,
            average_visit_duration,
            completion_rate,
            punctuality_rate,
        })
    }

    fn fetch_visit(&self, visit_id: &VisitId) -> Result<Visit, SchedulingError> {
        self.repository
            .fetch(visit_id)?
            .ok_or(SchedulingError::VisitNotFound)
    }

    /// Conflict checking is caregiver-scoped; an unassigned visit has no
    /// calendar to collide with.
    fn find_conflicts(
        &self,
        caregiver_id: Option<&CaregiverId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&VisitId>,
    ) -> Result<Vec<ScheduleConflict>, SchedulingError> {
        let Some(caregiver_id) = caregiver_id else {
            return Ok(Vec::new());
        };
        let candidates = self
            .repository
            .find_overlapping(caregiver_id, start, end, exclude)?;
        Ok(conflict::detect_conflicts(start, end, &candidates, exclude))
    }

    fn verify_location(
        &self,
        visit: &Visit,
        latitude: f64,
        longitude: f64,
    ) -> Result<(), SchedulingError> {
        let client = self
            .directory
            .client(&visit.client_id)?
            .ok_or(SchedulingError::ClientNotFound)?;
        let verified =
            self.verifier
                .is_within_service_area(latitude, longitude, &client.service_address)?;
        if !verified {
            warn!(visit = %visit.id.0, "location verification failed");
            return Err(SchedulingError::LocationInvalid);
        }
        Ok(())
    }

    fn materialize_occurrences(
        &self,
        base: &Visit,
        dates: &[NaiveDate],
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<usize, SchedulingError> {
        if end_time <= start_time {
            return Err(SchedulingError::InvalidInterval);
        }

        let mut created = 0;
        for date in dates {
            let start = instant(*date, start_time);
            let end = instant(*date, end_time);
            let conflicts = self.find_conflicts(base.caregiver_id.as_ref(), start, end, None)?;
            if !conflicts.is_empty() {
                info!(%date, "recurrence: occurrence skipped due to conflict");
                continue;
            }

            let visit = Visit {
                id: next_visit_id(),
                scheduled_start: start,
                scheduled_end: end,
                actual_start: None,
                actual_end: None,
                billable_hours: None,
                tasks: base
                    .tasks
                    .iter()
                    .map(|task| super::domain::VisitTask {
                        name: task.name.clone(),
                        category: task.category,
                        completed: false,
                        notes: None,
                        completed_at: None,
                    })
                    .collect(),
                caregiver_notes: None,
                client_signature: None,
                cancellation_notes: None,
                status: initial_status(base.caregiver_id.is_some()),
                recurrence: None,
                ..base.clone()
            };
            self.repository.insert(visit)?;
            created += 1;
        }
        Ok(created)
    }
}

fn initial_status(assigned: bool) -> VisitStatus {
    if assigned {
        VisitStatus::Assigned
    } else {
        VisitStatus::Scheduled
    }
}

fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), SchedulingError> {
    if end <= start {
        return Err(SchedulingError::InvalidInterval);
    }
    Ok(())
}

fn instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Error raised by the scheduler. [`SchedulingError::kind`] gives the
/// transport-agnostic classification.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("visit not found")]
    VisitNotFound,
    #[error("client not found")]
    ClientNotFound,
    #[error("caregiver has conflicting visits at this time")]
    ScheduleConflict { conflicts: Vec<ScheduleConflict> },
    #[error("scheduled end must be after scheduled start")]
    InvalidInterval,
    #[error("no task at index {0}")]
    UnknownTask(usize),
    #[error("location verification failed: device is not at the client service address")]
    LocationInvalid,
    #[error(transparent)]
    Forbidden(TransitionDenied),
    #[error(transparent)]
    DuplicateEvent(TransitionDenied),
    #[error(transparent)]
    Transition(TransitionDenied),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
}

impl From<TransitionDenied> for SchedulingError {
    fn from(denied: TransitionDenied) -> Self {
        match denied {
            TransitionDenied::NoCaregiverAssigned | TransitionDenied::WrongCaregiver => {
                SchedulingError::Forbidden(denied)
            }
            TransitionDenied::DuplicateClockIn | TransitionDenied::DuplicateClockOut => {
                SchedulingError::DuplicateEvent(denied)
            }
            _ => SchedulingError::Transition(denied),
        }
    }
}

/// Transport-agnostic error classification, one entry per taxonomy item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    BadRequest,
    LocationInvalid,
    Internal,
}

impl SchedulingError {
    pub fn kind(&self) -> SchedulingErrorKind {
        match self {
            SchedulingError::VisitNotFound | SchedulingError::ClientNotFound => {
                SchedulingErrorKind::NotFound
            }
            SchedulingError::Repository(RepositoryError::NotFound) => SchedulingErrorKind::NotFound,
            SchedulingError::Forbidden(_) => SchedulingErrorKind::Forbidden,
            SchedulingError::ScheduleConflict { .. }
            | SchedulingError::DuplicateEvent(_)
            | SchedulingError::Repository(RepositoryError::Conflict) => {
                SchedulingErrorKind::Conflict
            }
            SchedulingError::InvalidInterval
            | SchedulingError::UnknownTask(_)
            | SchedulingError::Transition(_) => SchedulingErrorKind::BadRequest,
            SchedulingError::LocationInvalid => SchedulingErrorKind::LocationInvalid,
            SchedulingError::Repository(RepositoryError::Unavailable(_))
            | SchedulingError::Directory(_)
            | SchedulingError::Verification(_) => SchedulingErrorKind::Internal,
        }
    }
}
