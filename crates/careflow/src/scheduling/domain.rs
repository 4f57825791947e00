use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for visits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitId(pub String);

/// Identifier wrapper for clients receiving care.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

/// Identifier wrapper for caregivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaregiverId(pub String);

/// Lifecycle state tracked for every visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    Scheduled,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    NoShowClient,
    NoShowCaregiver,
}

impl VisitStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VisitStatus::Scheduled => "scheduled",
            VisitStatus::Assigned => "assigned",
            VisitStatus::InProgress => "in_progress",
            VisitStatus::Completed => "completed",
            VisitStatus::Cancelled => "cancelled",
            VisitStatus::NoShowClient => "no_show_client",
            VisitStatus::NoShowCaregiver => "no_show_caregiver",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            VisitStatus::Completed
                | VisitStatus::Cancelled
                | VisitStatus::NoShowClient
                | VisitStatus::NoShowCaregiver
        )
    }

    /// Whether a visit in this state still occupies the caregiver's calendar
    /// for double-booking purposes.
    pub const fn occupies_calendar(self) -> bool {
        !self.is_terminal()
    }
}

/// Category of service delivered during a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitType {
    RegularCare,
    RespiteCare,
    EmergencyCare,
    Assessment,
    Supervision,
}

/// Care-plan task groupings used on visit checklists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskCategory {
    PersonalCare,
    MealPreparation,
    Medication,
    Mobility,
    Housekeeping,
    Companionship,
}

/// A checklist item owned by a visit, completed by the caregiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitTask {
    pub name: String,
    pub category: TaskCategory,
    pub completed: bool,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Task blueprint attached at scheduling time; starts incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub category: TaskCategory,
}

impl TaskTemplate {
    pub fn into_task(self) -> VisitTask {
        VisitTask {
            name: self.name,
            category: self.category,
            completed: false,
            notes: None,
            completed_at: None,
        }
    }
}

/// Position-addressed update applied to a visit's task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub index: usize,
    pub completed: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Calendar day-of-week, serialized in the agency's wire convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// Weekly recurrence template: which weekdays, and the fixed daily window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub days_of_week: BTreeSet<DayOfWeek>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub until: NaiveDate,
}

/// Weekly window during which a caregiver (or a client's need) is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day: DayOfWeek,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Female,
    Male,
    NonBinary,
}

/// Read-only caregiver attributes supplied by the directory for matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaregiverSnapshot {
    pub id: CaregiverId,
    pub skills: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub gender: Option<Gender>,
    pub availability: Vec<AvailabilityWindow>,
    pub prior_visits_with_client: u32,
    pub total_completed_visits: u32,
}

/// Service address used for EVV geofence checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub line1: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Client attributes the engine needs: identity and where care is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub display_name: String,
    pub service_address: ServiceAddress,
}

/// The central scheduling entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub client_id: ClientId,
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub status: VisitStatus,
    pub visit_type: VisitType,
    pub billable_hours: Option<f64>,
    pub tasks: Vec<VisitTask>,
    pub special_instructions: Option<String>,
    pub caregiver_notes: Option<String>,
    pub client_signature: Option<String>,
    pub cancellation_notes: Option<String>,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrencePattern>,
}

/// EVV event kinds the engine records. Ordering is enforced by the state
/// machine, not by storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvvEventKind {
    ClockIn,
    ClockOut,
}

impl EvvEventKind {
    pub const fn label(self) -> &'static str {
        match self {
            EvvEventKind::ClockIn => "clock_in",
            EvvEventKind::ClockOut => "clock_out",
        }
    }
}

/// Immutable verification fact captured at clock-in or clock-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvvEvent {
    pub visit_id: VisitId,
    pub kind: EvvEventKind,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub device_id: String,
}

/// Parameters for scheduling a single visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVisit {
    pub client_id: ClientId,
    #[serde(default)]
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub visit_type: VisitType,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
    #[serde(default)]
    pub recurrence: Option<RecurrencePattern>,
}

/// Partial update; absent fields keep their current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitUpdate {
    #[serde(default)]
    pub caregiver_id: Option<CaregiverId>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub visit_type: Option<VisitType>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    ClientIllness,
    ClientRequest,
    CaregiverIllness,
    CaregiverUnavailable,
    Weather,
    Emergency,
    SchedulingConflict,
    Other,
}

/// Replacement slot proposed alongside a cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub proposed_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub alternative_caregiver: Option<CaregiverId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelVisitRequest {
    pub reason: CancellationReason,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reschedule: Option<RescheduleRequest>,
}

/// Which party failed to appear; the decision itself is made upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoShowParty {
    Client,
    Caregiver,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockInRequest {
    pub caregiver_id: CaregiverId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockOutRequest {
    pub caregiver_id: CaregiverId,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub device_id: String,
    #[serde(default)]
    pub completion_notes: Option<String>,
    #[serde(default)]
    pub client_signature: Option<String>,
}

/// Result of a verified clock-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockOutOutcome {
    pub event: EvvEvent,
    pub billable_hours: f64,
}

/// Result of a cancellation, including the replacement visit when a
/// reschedule was requested and accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationOutcome {
    pub cancelled: Visit,
    pub replacement: Option<Visit>,
}

/// Typed parameters for a standalone conflict check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictQuery {
    #[serde(default)]
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    #[serde(default)]
    pub exclude_visit_id: Option<VisitId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    CaregiverDoubleBooked,
}

/// Actionable hint attached to every reported conflict. The engine never
/// auto-resolves; the caller decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSuggestion {
    Reschedule,
}

/// One conflicting visit, with enough structure for the caller to act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub conflict_type: ConflictType,
    pub visit_id: VisitId,
    pub client_id: ClientId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub message: String,
    pub suggestion: ConflictSuggestion,
}

/// Inclusive calendar range for recurrence expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Bulk generation request: a period, a weekly pattern, and exclusions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkScheduleRequest {
    pub client_id: ClientId,
    #[serde(default)]
    pub caregiver_id: Option<CaregiverId>,
    pub period: SchedulePeriod,
    pub days_of_week: BTreeSet<DayOfWeek>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub visit_type: VisitType,
    #[serde(default)]
    pub exclude_dates: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub tasks: Vec<TaskTemplate>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// Best-effort bulk result: a count plus a sample of what was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkScheduleOutcome {
    pub created_count: usize,
    pub visits: Vec<Visit>,
}

/// Client needs against which caregiver candidates are ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub client_id: ClientId,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_languages: Vec<String>,
    #[serde(default)]
    pub gender_preference: Option<Gender>,
    #[serde(default)]
    pub availability_needed: Vec<AvailabilityWindow>,
    #[serde(default)]
    pub max_distance_km: Option<u32>,
}

/// Named sub-scores composing a match score; each factor is capped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchFactors {
    pub skills_match: f32,
    pub language_match: f32,
    pub gender_match: f32,
    pub distance_score: f32,
    pub availability_match: f32,
    pub continuity_bonus: f32,
    pub experience_bonus: f32,
}

impl MatchFactors {
    pub fn total(&self) -> f32 {
        self.skills_match
            + self.language_match
            + self.gender_match
            + self.distance_score
            + self.availability_match
            + self.continuity_bonus
            + self.experience_bonus
    }
}

/// Ranked caregiver candidate with a transparent factor breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub caregiver_id: CaregiverId,
    pub match_score: u8,
    pub factors: MatchFactors,
    pub reasons_to_choose: Vec<String>,
    pub potential_concerns: Vec<String>,
}

/// Instant range used by statistics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Typed filter for visit statistics; no open-ended filter maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitStatsQuery {
    #[serde(default)]
    pub date_range: Option<InstantRange>,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub caregiver_id: Option<CaregiverId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitStats {
    pub total_visits: usize,
    pub completed_visits: usize,
    pub cancelled_visits: usize,
    pub no_show_visits: usize,
    pub total_billable_hours: f64,
    pub average_visit_duration: f64,
    pub completion_rate: f64,
    pub punctuality_rate: f64,
}
