use chrono::{DateTime, Utc};

use super::domain::{
    CaregiverId, CaregiverSnapshot, ClientId, ClientProfile, EvvEvent, EvvEventKind, MatchRequest,
    ServiceAddress, Visit, VisitId,
};

/// Typed listing filter; the engine never accepts open-ended filter maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitQuery {
    pub client_id: Option<ClientId>,
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_from: Option<DateTime<Utc>>,
    pub scheduled_to: Option<DateTime<Utc>>,
}

/// Storage abstraction for visits and EVV events.
///
/// Implementations must make the read-check-write sequences the scheduler
/// performs atomic per caregiver (for bookings) and per visit (for EVV
/// events); the in-memory implementation serializes on a single lock, a SQL
/// implementation would use row-level locking or optimistic retry.
pub trait VisitRepository: Send + Sync {
    fn insert(&self, visit: Visit) -> Result<Visit, RepositoryError>;
    fn update(&self, visit: Visit) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError>;
    /// Candidate set for conflict detection. Implementations may
    /// over-approximate; the conflict detector re-applies the half-open
    /// overlap rule and status filter.
    fn find_overlapping(
        &self,
        caregiver_id: &CaregiverId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&VisitId>,
    ) -> Result<Vec<Visit>, RepositoryError>;
    fn insert_event(&self, event: EvvEvent) -> Result<(), RepositoryError>;
    fn find_event(
        &self,
        visit_id: &VisitId,
        kind: EvvEventKind,
    ) -> Result<Option<EvvEvent>, RepositoryError>;
    fn list(&self, query: &VisitQuery) -> Result<Vec<Visit>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only provider of client profiles and caregiver snapshots.
pub trait CareDirectory: Send + Sync {
    fn client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError>;
    fn caregiver_pool(
        &self,
        request: &MatchRequest,
    ) -> Result<Vec<CaregiverSnapshot>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("care directory unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable geofence capability: is the reporting device within an
/// acceptable radius of the service address? The exact radius and algorithm
/// are deployment concerns; the contract is boolean.
pub trait LocationVerifier: Send + Sync {
    fn is_within_service_area(
        &self,
        latitude: f64,
        longitude: f64,
        address: &ServiceAddress,
    ) -> Result<bool, VerificationError>;
}

/// Location verification must fail loudly when it cannot run; silently
/// approving every clock-in defeats EVV.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("location verification is not configured for this deployment")]
    Unconfigured,
    #[error("location verification unavailable: {0}")]
    Unavailable(String),
}

/// Pluggable travel-distance factor for matching. Returns the candidate's
/// distance contribution; the matcher caps it at the factor maximum.
pub trait DistanceScorer: Send + Sync {
    fn score(&self, request: &MatchRequest, candidate: &CaregiverSnapshot) -> f32;
}
