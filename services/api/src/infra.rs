use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use careflow::scheduling::{
    CareDirectory, CaregiverId, CaregiverSnapshot, ClientId, ClientProfile, DirectoryError,
    DistanceScorer, EvvEvent, EvvEventKind, LocationVerifier, MatchRequest, RepositoryError,
    ServiceAddress, VerificationError, Visit, VisitId, VisitQuery, VisitRepository,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
pub(crate) struct InMemoryVisitRepository {
    visits: Mutex<HashMap<VisitId, Visit>>,
    events: Mutex<Vec<EvvEvent>>,
}

impl VisitRepository for InMemoryVisitRepository {
    fn insert(&self, visit: Visit) -> Result<Visit, RepositoryError> {
        let mut guard = self.visits.lock().expect("repository mutex poisoned");
        if guard.contains_key(&visit.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(visit.id.clone(), visit.clone());
        Ok(visit)
    }

    fn update(&self, visit: Visit) -> Result<(), RepositoryError> {
        let mut guard = self.visits.lock().expect("repository mutex poisoned");
        if guard.contains_key(&visit.id) {
            guard.insert(visit.id.clone(), visit);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        let guard = self.visits.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn find_overlapping(
        &self,
        caregiver_id: &CaregiverId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&VisitId>,
    ) -> Result<Vec<Visit>, RepositoryError> {
        let guard = self.visits.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|visit| visit.caregiver_id.as_ref() == Some(caregiver_id))
            .filter(|visit| Some(&visit.id) != exclude)
            .filter(|visit| visit.scheduled_start < end && start < visit.scheduled_end)
            .cloned()
            .collect())
    }

    fn insert_event(&self, event: EvvEvent) -> Result<(), RepositoryError> {
        let mut guard = self.events.lock().expect("event mutex poisoned");
        guard.push(event);
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
        let guard = self.visits.lock().expect("repository mutex poisoned");
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

/// Directory backed by in-process maps. A production deployment would back
/// this with the agency's client and HR systems.
#[derive(Default)]
pub(crate) struct InMemoryCareDirectory {
    clients: Mutex<HashMap<ClientId, ClientProfile>>,
    pool: Mutex<Vec<CaregiverSnapshot>>,
}

impl InMemoryCareDirectory {
    pub(crate) fn upsert_client(&self, profile: ClientProfile) {
        self.clients
            .lock()
            .expect("directory mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(crate) fn set_caregiver_pool(&self, pool: Vec<CaregiverSnapshot>) {
        *self.pool.lock().expect("pool mutex poisoned") = pool;
    }
}

impl CareDirectory for InMemoryCareDirectory {
    fn client(&self, id: &ClientId) -> Result<Option<ClientProfile>, DirectoryError> {
        let guard = self.clients.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn caregiver_pool(
        &self,
        _request: &MatchRequest,
    ) -> Result<Vec<CaregiverSnapshot>, DirectoryError> {
        Ok(self.pool.lock().expect("pool mutex poisoned").clone())
    }
}

/// Great-circle geofence against the client's service address. The radius
/// comes from configuration; when it is absent every check fails loudly so
/// an unconfigured deployment cannot silently approve clock-ins.
pub(crate) struct HaversineVerifier {
    radius_meters: Option<f64>,
}

impl HaversineVerifier {
    pub(crate) fn new(radius_meters: Option<f64>) -> Self {
        Self { radius_meters }
    }
}

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub(crate) fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

impl LocationVerifier for HaversineVerifier {
    fn is_within_service_area(
        &self,
        latitude: f64,
        longitude: f64,
        address: &ServiceAddress,
    ) -> Result<bool, VerificationError> {
        let radius = self.radius_meters.ok_or(VerificationError::Unconfigured)?;
        let (Some(lat), Some(lon)) = (address.latitude, address.longitude) else {
            return Err(VerificationError::Unavailable(
                "service address has no coordinates".to_string(),
            ));
        };
        Ok(haversine_meters(latitude, longitude, lat, lon) <= radius)
    }
}

/// Travel distance contribution used until a routing provider is wired in.
/// Every candidate receives the same mid-range score.
pub(crate) struct FlatTravelScore;

pub(crate) const DEFAULT_TRAVEL_SCORE: f32 = 8.0;

impl DistanceScorer for FlatTravelScore {
    fn score(&self, _request: &MatchRequest, _candidate: &CaregiverSnapshot) -> f32 {
        DEFAULT_TRAVEL_SCORE
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(lat: Option<f64>, lon: Option<f64>) -> ServiceAddress {
        ServiceAddress {
            line1: "412 Maple Street".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            postal_code: "50309".to_string(),
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn haversine_is_zero_for_identical_points() {
        assert!(haversine_meters(41.5868, -93.625, 41.5868, -93.625) < 1e-6);
    }

    #[test]
    fn verifier_accepts_points_inside_the_radius() {
        let verifier = HaversineVerifier::new(Some(150.0));
        // Roughly 110 meters north of the service address.
        let within = verifier
            .is_within_service_area(41.5878, -93.625, &address(Some(41.5868), Some(-93.625)))
            .expect("check runs");
        assert!(within);

        let beyond = verifier
            .is_within_service_area(41.6, -93.625, &address(Some(41.5868), Some(-93.625)))
            .expect("check runs");
        assert!(!beyond);
    }

    #[test]
    fn unconfigured_radius_fails_loudly() {
        let verifier = HaversineVerifier::new(None);
        let result = verifier.is_within_service_area(
            41.5868,
            -93.625,
            &address(Some(41.5868), Some(-93.625)),
        );
        assert!(matches!(result, Err(VerificationError::Unconfigured)));
    }

    #[test]
    fn missing_address_coordinates_fail_the_check() {
        let verifier = HaversineVerifier::new(Some(150.0));
        let result = verifier.is_within_service_area(41.5868, -93.625, &address(None, None));
        assert!(matches!(result, Err(VerificationError::Unavailable(_))));
    }
}
