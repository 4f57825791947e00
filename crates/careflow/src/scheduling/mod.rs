//! Visit scheduling and verification: conflict detection, the EVV
//! clock-in/clock-out state machine, caregiver matching, and recurrence
//! expansion, orchestrated by [`VisitScheduler`].

pub mod conflict;
pub mod domain;
pub mod evv;
pub mod matching;
pub mod recurrence;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AvailabilityWindow, BulkScheduleOutcome, BulkScheduleRequest, CancelVisitRequest,
    CancellationOutcome, CancellationReason, CaregiverId, CaregiverSnapshot, ClientId,
    ClientProfile, ClockInRequest, ClockOutOutcome, ClockOutRequest, ConflictQuery,
    ConflictSuggestion, ConflictType, DayOfWeek, EvvEvent, EvvEventKind, Gender, InstantRange,
    MatchFactors, MatchRequest, MatchResult, NewVisit, NoShowParty, RecurrencePattern,
    RescheduleRequest, ScheduleConflict, SchedulePeriod, ServiceAddress, TaskCategory,
    TaskTemplate, TaskUpdate, Visit, VisitId, VisitStats, VisitStatsQuery, VisitStatus, VisitTask,
    VisitType, VisitUpdate,
};
pub use evv::TransitionDenied;
pub use matching::CaregiverMatcher;
pub use repository::{
    CareDirectory, DirectoryError, DistanceScorer, LocationVerifier, RepositoryError,
    VerificationError, VisitQuery, VisitRepository,
};
pub use router::scheduling_router;
pub use service::{SchedulingError, SchedulingErrorKind, VisitScheduler};
