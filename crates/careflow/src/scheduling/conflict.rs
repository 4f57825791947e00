use chrono::{DateTime, Utc};

use super::domain::{ConflictSuggestion, ConflictType, ScheduleConflict, Visit, VisitId};

/// Half-open interval overlap: `[s1, e1)` and `[s2, e2)` collide iff
/// `s1 < e2 && s2 < e1`. A visit ending exactly when another starts does not
/// conflict.
pub fn intervals_overlap(
    s1: DateTime<Utc>,
    e1: DateTime<Utc>,
    s2: DateTime<Utc>,
    e2: DateTime<Utc>,
) -> bool {
    s1 < e2 && s2 < e1
}

/// Report every visit in `existing` that collides with the candidate window.
///
/// Terminal visits never occupy the calendar, and the visit named by
/// `exclude_visit_id` is skipped so an update can be checked against all
/// *other* visits. Callers pass caregiver-scoped candidates; an unassigned
/// visit has no calendar to collide with, so the caller short-circuits to an
/// empty set before reaching this function.
pub fn detect_conflicts(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &[Visit],
    exclude_visit_id: Option<&VisitId>,
) -> Vec<ScheduleConflict> {
    existing
        .iter()
        .filter(|visit| Some(&visit.id) != exclude_visit_id)
        .filter(|visit| visit.status.occupies_calendar())
        .filter(|visit| intervals_overlap(start, end, visit.scheduled_start, visit.scheduled_end))
        .map(conflict_report)
        .collect()
}

fn conflict_report(visit: &Visit) -> ScheduleConflict {
    ScheduleConflict {
        conflict_type: ConflictType::CaregiverDoubleBooked,
        visit_id: visit.id.clone(),
        client_id: visit.client_id.clone(),
        scheduled_start: visit.scheduled_start,
        scheduled_end: visit.scheduled_end,
        message: format!(
            "conflicts with existing visit {} for client {} ({} to {})",
            visit.id.0, visit.client_id.0, visit.scheduled_start, visit.scheduled_end
        ),
        suggestion: ConflictSuggestion::Reschedule,
    }
}
