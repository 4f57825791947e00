use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::scheduling::domain::{
    AvailabilityWindow, CaregiverId, CaregiverSnapshot, ClientId, ClientProfile, ClockInRequest,
    ClockOutRequest, DayOfWeek, EvvEvent, EvvEventKind, Gender, MatchRequest, NewVisit,
    ServiceAddress, TaskCategory, TaskTemplate, Visit, VisitId, VisitStatus, VisitType,
};
use crate::scheduling::repository::{
    CareDirectory, DirectoryError, DistanceScorer, LocationVerifier, RepositoryError,
    VerificationError, VisitQuery, VisitRepository,
};
use crate::scheduling::router::scheduling_router;
use crate::scheduling::service::VisitScheduler;

pub(super) fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("valid instant")
}

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn time(h: u32, min: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, min, 0).expect("valid time")
}

pub(super) fn client_id() -> ClientId {
    ClientId("client-001".to_string())
}

pub(super) fn caregiver_id(suffix: &str) -> CaregiverId {
    CaregiverId(format!("caregiver-{suffix}"))
}

pub(super) fn client_profile() -> ClientProfile {
    ClientProfile {
        id: client_id(),
        display_name: "Margaret H.".to_string(),
        service_address: ServiceAddress {
            line1: "412 Maple Street".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            postal_code: "50309".to_string(),
            latitude: Some(41.5868),
            longitude: Some(-93.625),
        },
    }
}

pub(super) fn new_visit(
    caregiver: Option<CaregiverId>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> NewVisit {
    NewVisit {
        client_id: client_id(),
        caregiver_id: caregiver,
        scheduled_start: start,
        scheduled_end: end,
        visit_type: VisitType::RegularCare,
        special_instructions: None,
        tasks: vec![
            TaskTemplate {
                name: "Morning medication".to_string(),
                category: TaskCategory::Medication,
            },
            TaskTemplate {
                name: "Prepare lunch".to_string(),
                category: TaskCategory::MealPreparation,
            },
        ],
        recurrence: None,
    }
}

pub(super) fn clock_in_request(caregiver: &CaregiverId, timestamp: DateTime<Utc>) -> ClockInRequest {
    ClockInRequest {
        caregiver_id: caregiver.clone(),
        timestamp,
        latitude: 41.5868,
        longitude: -93.625,
        device_id: "device-7".to_string(),
    }
}

pub(super) fn clock_out_request(
    caregiver: &CaregiverId,
    timestamp: DateTime<Utc>,
) -> ClockOutRequest {
    ClockOutRequest {
        caregiver_id: caregiver.clone(),
        timestamp,
        latitude: 41.5868,
        longitude: -93.625,
        device_id: "device-7".to_string(),
        completion_notes: Some("All tasks done".to_string()),
        client_signature: Some("MH".to_string()),
    }
}

pub(super) fn skills(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub(super) fn snapshot(suffix: &str) -> CaregiverSnapshot {
    CaregiverSnapshot {
        id: caregiver_id(suffix),
        skills: skills(&["PERSONAL_CARE", "MEAL_PREPARATION"]),
        languages: skills(&["English"]),
        gender: Some(Gender::Female),
        availability: vec![AvailabilityWindow {
            day: DayOfWeek::Monday,
            start: time(8, 0),
            end: time(18, 0),
        }],
        prior_visits_with_client: 0,
        total_completed_visits: 0,
    }
}

pub(super) fn match_request() -> MatchRequest {
    MatchRequest {
        client_id: client_id(),
        required_skills: vec!["PERSONAL_CARE".to_string()],
        preferred_languages: vec!["English".to_string()],
        gender_preference: None,
        availability_needed: Vec::new(),
        max_distance_km: Some(25),
    }
}

#[derive(Default)]
pub(super) struct MemoryRepository {
    visits: Mutex<HashMap<VisitId, Visit>>,
    events: Mutex<Vec<EvvEvent>>,
}

impl MemoryRepository {
    pub(super) fn events(&self) -> Vec<EvvEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }

    pub(super) fn visit(&self, id: &VisitId) -> Option<Visit> {
        self.visits
            .lock()
            .expect("visit mutex poisoned")
            .get(id)
            .cloned()
    }
}

impl VisitRepository for MemoryRepository {
    fn insert(&self, visit: Visit) -> Result<Visit, RepositoryError> {
        let mut guard = self.visits.lock().expect("visit mutex poisoned");
        if guard.contains_key(&visit.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(visit.id.clone(), visit.clone());
        Ok(visit)
    }

    fn update(&self, visit: Visit) -> Result<(), RepositoryError> {
        let mut guard = self.visits.lock().expect("visit mutex poisoned");
        if !guard.contains_key(&visit.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(visit.id.clone(), visit);
        Ok(())
    }

    fn fetch(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        let guard = self.visits.lock().expect("visit mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_overlapping(
        &self,
        caregiver_id: &CaregiverId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&VisitId>,
    ) -> Result<Vec<Visit>, RepositoryError> {
        let guard = self.visits.lock().expect("visit mutex poisoned");
        Ok(guard
            .values()
            .filter(|visit| visit.caregiver_id.as_ref() == Some(caregiver_id))
            .filter(|visit| Some(&visit.id) != exclude)
            .filter(|visit| visit.scheduled_start < end && start < visit.scheduled_end)
            .cloned()
            .collect())
    }

    fn insert_event(&self, event: EvvEvent) -> Result<(), RepositoryError> {
        self.events.lock().expect("event mutex poisoned").push(event);
        Ok(())
    }

    fn find_event(
        &self,
        visit_id: &VisitId,
        kind: EvvEventKind,
    ) -> Result<Option<EvvEvent>, RepositoryError> {
        let guard = self.events.lock().expect("event mutex poisoned");
        Ok(guard
            .iter()
            .find(|event| &event.visit_id == visit_id && event.kind == kind)
            .cloned())
    }

    fn list(&self, query: &VisitQuery) -> Result<Vec<Visit>, RepositoryError> {
        let guard = self.visits.lock().expect("visit mutex poisoned");
        Ok(guard
            .values()
            .filter(|visit| match &query.client_id {
                Some(id) => &visit.client_id == id,
                None => true,
            })
            .filter(|visit| match &query.caregiver_id {
                Some(id) => visit.caregiver_id.as_ref() == Some(id),
                None => true,
            })
            .filter(|visit| match query.scheduled_from {
                Some(from) => visit.scheduled_start >= from,
                None => true,
            })
            .filter(|visit| match query.scheduled_to {
                Some(to) => visit.scheduled_start <= to,
                None => true,
            })
            .cloned()
            .collect())
    }
}

/// Repository that refuses every call, for failure-path assertions.
pub(super) struct UnavailableRepository;

impl VisitRepository for UnavailableRepository {
    fn insert(&self, _visit: Visit) -> Result<Visit, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _visit: Visit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_overlapping(
        &self,
        _caregiver_id: &CaregiverId,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _exclude: Option<&VisitId>,
    ) -> Result<Vec<Visit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_event(&self, _event: EvvEvent) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_event(
        &self,
        _visit_id: &VisitId,
        _kind: EvvEventKind,
    ) -> Result<Option<EvvEvent>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self, _query: &VisitQuery) -> Result<Vec<Visit>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    clients: Mutex<HashMap<ClientId, ClientProfile>>,
    pool: Mutex<Vec<CaregiverSnapshot>>,
}

impl MemoryDirectory {
    pub(super) fn with_client(profile: ClientProfile) -> Self {
        let directory = Self::default();
        directory
            .clients
            .lock()
            .expect("client mutex poisoned")
            .insert(profile.id.clone(), profile);
        directory
    }

    pub(super) fn set_pool(&self, pool: Vec<CaregiverSnapshot>) {
        *self.pool.lock().expect("pool mutex poisoned") = pool;
    }
}

impl CareDirectory for MemoryDirectory {
    fn client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError> {
        let guard = self.clients.lock().expect("client mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn caregiver_pool(
        &self,
        _request: &MatchRequest,
    ) -> Result<Vec<CaregiverSnapshot>, DirectoryError> {
        Ok(self.pool.lock().expect("pool mutex poisoned").clone())
    }
}

/// Verifier with a fixed answer, standing in for a real geofence.
pub(super) struct StaticVerifier {
    pub(super) allow: bool,
}

impl LocationVerifier for StaticVerifier {
    fn is_within_service_area(
        &self,
        _latitude: f64,
        _longitude: f64,
        _address: &ServiceAddress,
    ) -> Result<bool, VerificationError> {
        Ok(self.allow)
    }
}

/// Verifier that has not been configured; every check fails loudly.
pub(super) struct UnconfiguredVerifier;

impl LocationVerifier for UnconfiguredVerifier {
    fn is_within_service_area(
        &self,
        _latitude: f64,
        _longitude: f64,
        _address: &ServiceAddress,
    ) -> Result<bool, VerificationError> {
        Err(VerificationError::Unconfigured)
    }
}

pub(super) struct FixedDistance(pub(super) f32);

impl DistanceScorer for FixedDistance {
    fn score(&self, _request: &MatchRequest, _candidate: &CaregiverSnapshot) -> f32 {
        self.0
    }
}

pub(super) type TestScheduler = VisitScheduler<MemoryRepository, MemoryDirectory, StaticVerifier>;

pub(super) fn build_scheduler() -> (
    TestScheduler,
    Arc<MemoryRepository>,
    Arc<MemoryDirectory>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let directory = Arc::new(MemoryDirectory::with_client(client_profile()));
    let scheduler = VisitScheduler::new(
        repository.clone(),
        directory.clone(),
        Arc::new(StaticVerifier { allow: true }),
        Arc::new(FixedDistance(8.0)),
    );
    (scheduler, repository, directory)
}

pub(super) fn build_scheduler_with_verifier(
    allow: bool,
) -> (TestScheduler, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let directory = Arc::new(MemoryDirectory::with_client(client_profile()));
    let scheduler = VisitScheduler::new(
        repository.clone(),
        directory,
        Arc::new(StaticVerifier { allow }),
        Arc::new(FixedDistance(8.0)),
    );
    (scheduler, repository)
}

pub(super) fn scheduler_router(scheduler: TestScheduler) -> axum::Router {
    scheduling_router(Arc::new(scheduler))
}

pub(super) fn assert_conflict_response(response: &Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Scheduled visit fixture for direct conflict-detector tests.
pub(super) fn visit_fixture(
    id: &str,
    caregiver: Option<CaregiverId>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: VisitStatus,
) -> Visit {
    Visit {
        id: VisitId(format!("visit-fixture-{id}")),
        client_id: client_id(),
        caregiver_id: caregiver,
        scheduled_start: start,
        scheduled_end: end,
        actual_start: None,
        actual_end: None,
        status,
        visit_type: VisitType::RegularCare,
        billable_hours: None,
        tasks: Vec::new(),
        special_instructions: None,
        caregiver_notes: None,
        client_signature: None,
        cancellation_notes: None,
        is_recurring: false,
        recurrence: None,
    }
}
