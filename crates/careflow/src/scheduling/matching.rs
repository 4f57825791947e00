//! Caregiver matching engine: additive 0-100 scoring over read-only
//! caregiver snapshots, deterministic for identical inputs.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::domain::{
    AvailabilityWindow, CaregiverSnapshot, Gender, MatchFactors, MatchRequest, MatchResult,
};
use super::repository::DistanceScorer;

pub const MAX_RESULTS: usize = 10;

const SKILLS_MAX: f32 = 25.0;
const LANGUAGE_MAX: f32 = 15.0;
const GENDER_MAX: f32 = 10.0;
const DISTANCE_MAX: f32 = 10.0;
const AVAILABILITY_MAX: f32 = 20.0;
const CONTINUITY_MAX: f32 = 10.0;
const EXPERIENCE_MAX: f32 = 10.0;

/// Ranks caregiver candidates against a client's needs. Distance is the one
/// factor the engine cannot compute from snapshots alone, so it is injected.
pub struct CaregiverMatcher {
    distance: Arc<dyn DistanceScorer>,
}

impl CaregiverMatcher {
    pub fn new(distance: Arc<dyn DistanceScorer>) -> Self {
        Self { distance }
    }

    /// Score every candidate and return at most [`MAX_RESULTS`] of them,
    /// best first. The sort is stable, so equally scored candidates keep
    /// their input order.
    pub fn rank(&self, request: &MatchRequest, pool: &[CaregiverSnapshot]) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = pool
            .iter()
            .map(|candidate| self.score_candidate(request, candidate))
            .collect();

        results.sort_by(|a, b| b.match_score.cmp(&a.match_score));
        results.truncate(MAX_RESULTS);
        results
    }

    fn score_candidate(&self, request: &MatchRequest, candidate: &CaregiverSnapshot) -> MatchResult {
        let factors = MatchFactors {
            skills_match: skills_factor(&request.required_skills, &candidate.skills),
            language_match: language_factor(&request.preferred_languages, &candidate.languages),
            gender_match: gender_factor(request.gender_preference, candidate.gender),
            distance_score: self
                .distance
                .score(request, candidate)
                .clamp(0.0, DISTANCE_MAX),
            availability_match: availability_factor(
                &request.availability_needed,
                &candidate.availability,
            ),
            continuity_bonus: continuity_factor(candidate.prior_visits_with_client),
            experience_bonus: experience_factor(candidate.total_completed_visits),
        };

        MatchResult {
            caregiver_id: candidate.id.clone(),
            match_score: factors.total().round().clamp(0.0, 100.0) as u8,
            reasons_to_choose: reasons(&factors),
            potential_concerns: concerns(&factors),
            factors,
        }
    }
}

/// Proportional over the required list; an empty requirement contributes
/// nothing rather than a free 25 points.
fn skills_factor(required: &[String], skills: &BTreeSet<String>) -> f32 {
    if required.is_empty() {
        return 0.0;
    }
    let matched = required.iter().filter(|skill| skills.contains(*skill)).count();
    matched as f32 / required.len() as f32 * SKILLS_MAX
}

/// Binary: one shared language earns the full factor.
fn language_factor(preferred: &[String], spoken: &BTreeSet<String>) -> f32 {
    if preferred.iter().any(|language| spoken.contains(language)) {
        LANGUAGE_MAX
    } else {
        0.0
    }
}

fn gender_factor(preference: Option<Gender>, gender: Option<Gender>) -> f32 {
    match (preference, gender) {
        (Some(wanted), Some(actual)) if wanted == actual => GENDER_MAX,
        _ => 0.0,
    }
}

/// A caregiver window covers a needed slot when it is the same day and fully
/// contains the needed times. No requirement means full marks.
fn availability_factor(needed: &[AvailabilityWindow], offered: &[AvailabilityWindow]) -> f32 {
    if needed.is_empty() {
        return AVAILABILITY_MAX;
    }
    let matched = needed
        .iter()
        .filter(|slot| {
            offered.iter().any(|window| {
                window.day == slot.day && window.start <= slot.start && window.end >= slot.end
            })
        })
        .count();
    matched as f32 / needed.len() as f32 * AVAILABILITY_MAX
}

fn continuity_factor(prior_visits_with_client: u32) -> f32 {
    if prior_visits_with_client > 0 {
        CONTINUITY_MAX
    } else {
        0.0
    }
}

/// Experience keys off system-wide completed visits so it measures something
/// continuity does not.
fn experience_factor(total_completed_visits: u32) -> f32 {
    (total_completed_visits as f32 * 2.0).min(EXPERIENCE_MAX)
}

fn reasons(factors: &MatchFactors) -> Vec<String> {
    let mut reasons = Vec::new();
    if factors.skills_match > 20.0 {
        reasons.push("Strong skills match".to_string());
    }
    if factors.language_match > 0.0 {
        reasons.push("Language compatibility".to_string());
    }
    if factors.continuity_bonus > 0.0 {
        reasons.push("Previous experience with client".to_string());
    }
    if factors.experience_bonus > 8.0 {
        reasons.push("Experienced caregiver".to_string());
    }
    if factors.availability_match > 15.0 {
        reasons.push("Good availability match".to_string());
    }
    reasons
}

fn concerns(factors: &MatchFactors) -> Vec<String> {
    let mut concerns = Vec::new();
    if factors.skills_match < 15.0 {
        concerns.push("Limited skills match".to_string());
    }
    if factors.distance_score < 5.0 {
        concerns.push("Long travel distance".to_string());
    }
    if factors.availability_match < 10.0 {
        concerns.push("Limited availability".to_string());
    }
    concerns
}
