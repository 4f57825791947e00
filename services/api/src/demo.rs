use crate::infra::{
    FlatTravelScore, HaversineVerifier, InMemoryCareDirectory, InMemoryVisitRepository,
};
use careflow::error::AppError;
use careflow::scheduling::{
    AvailabilityWindow, BulkScheduleRequest, CaregiverId, CaregiverSnapshot, ClientId,
    ClientProfile, ClockInRequest, ClockOutRequest, DayOfWeek, Gender, MatchRequest, NewVisit,
    SchedulePeriod, ServiceAddress, TaskCategory, TaskTemplate, VisitScheduler, VisitStatsQuery,
    VisitType,
};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// First day of the demo schedule (YYYY-MM-DD). Defaults to the next Monday.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) start_date: Option<NaiveDate>,
    /// Skip the caregiver matching portion of the demo.
    #[arg(long)]
    pub(crate) skip_matching: bool,
}

const DEMO_CLIENT: &str = "client-demo";
const DEMO_RADIUS_METERS: f64 = 150.0;

pub(crate) fn seed_directory(directory: &InMemoryCareDirectory) {
    directory.upsert_client(ClientProfile {
        id: ClientId(DEMO_CLIENT.to_string()),
        display_name: "Margaret H.".to_string(),
        service_address: ServiceAddress {
            line1: "412 Maple Street".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            postal_code: "50309".to_string(),
            latitude: Some(41.5868),
            longitude: Some(-93.625),
        },
    });
    directory.set_caregiver_pool(vec![
        CaregiverSnapshot {
            id: CaregiverId("caregiver-ana".to_string()),
            skills: ["PERSONAL_CARE".to_string(), "MEDICATION".to_string()]
                .into_iter()
                .collect(),
            languages: ["English".to_string(), "Spanish".to_string()]
                .into_iter()
                .collect(),
            gender: Some(Gender::Female),
            availability: weekday_availability(),
            prior_visits_with_client: 4,
            total_completed_visits: 120,
        },
        CaregiverSnapshot {
            id: CaregiverId("caregiver-ben".to_string()),
            skills: ["PERSONAL_CARE".to_string()].into_iter().collect(),
            languages: ["English".to_string()].into_iter().collect(),
            gender: Some(Gender::Male),
            availability: weekday_availability(),
            prior_visits_with_client: 0,
            total_completed_visits: 2,
        },
    ]);
}

fn weekday_availability() -> Vec<AvailabilityWindow> {
    [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
    ]
    .into_iter()
    .map(|day| AvailabilityWindow {
        day,
        start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
        end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
    })
    .collect()
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    let ahead = match (7 - today.weekday().num_days_from_monday()) % 7 {
        0 => 7,
        days => days,
    };
    today + Duration::days(i64::from(ahead))
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let start_date = args
        .start_date
        .unwrap_or_else(|| next_monday(Local::now().date_naive()));

    let repository = Arc::new(InMemoryVisitRepository::default());
    let directory = Arc::new(InMemoryCareDirectory::default());
    seed_directory(&directory);
    let scheduler = VisitScheduler::new(
        repository,
        directory,
        Arc::new(HaversineVerifier::new(Some(DEMO_RADIUS_METERS))),
        Arc::new(FlatTravelScore),
    );

    let caregiver = CaregiverId("caregiver-ana".to_string());
    let morning = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default();
    let midday = NaiveTime::from_hms_opt(11, 30, 0).unwrap_or_default();

    println!("Visit scheduling demo");
    println!("\nBooking a standing Monday/Wednesday/Friday schedule");
    let outcome = scheduler.create_bulk_schedule(BulkScheduleRequest {
        client_id: ClientId(DEMO_CLIENT.to_string()),
        caregiver_id: Some(caregiver.clone()),
        period: SchedulePeriod {
            start_date,
            end_date: start_date + Duration::days(11),
        },
        days_of_week: [DayOfWeek::Monday, DayOfWeek::Wednesday, DayOfWeek::Friday]
            .into_iter()
            .collect(),
        start_time: morning,
        end_time: midday,
        visit_type: VisitType::RegularCare,
        exclude_dates: Default::default(),
        tasks: vec![TaskTemplate {
            name: "Morning medication".to_string(),
            category: TaskCategory::Medication,
        }],
        special_instructions: None,
    })?;
    println!("- Created {} visits", outcome.created_count);
    for visit in &outcome.visits {
        println!(
            "  - {} on {} ({})",
            visit.id.0,
            visit.scheduled_start.date_naive(),
            visit.status.label()
        );
    }

    println!("\nAttempting a double booking");
    let conflict = scheduler.create_visit(NewVisit {
        client_id: ClientId(DEMO_CLIENT.to_string()),
        caregiver_id: Some(caregiver.clone()),
        scheduled_start: Utc.from_utc_datetime(&start_date.and_time(morning)),
        scheduled_end: Utc.from_utc_datetime(&start_date.and_time(midday)),
        visit_type: VisitType::RegularCare,
        special_instructions: None,
        tasks: Vec::new(),
        recurrence: None,
    });
    match conflict {
        Err(err) => println!("- Refused as expected: {err}"),
        Ok(visit) => println!("- Unexpectedly booked {}", visit.id.0),
    }

    let first = outcome
        .visits
        .first()
        .cloned()
        .ok_or_else(|| AppError::Scheduling(careflow::scheduling::SchedulingError::VisitNotFound))?;

    println!("\nRunning the verified visit lifecycle for {}", first.id.0);
    scheduler.clock_in(
        &first.id,
        ClockInRequest {
            caregiver_id: caregiver.clone(),
            timestamp: first.scheduled_start,
            latitude: 41.5868,
            longitude: -93.625,
            device_id: "demo-device".to_string(),
        },
    )?;
    println!("- Clock-in verified at the service address");
    let completed = scheduler.clock_out(
        &first.id,
        ClockOutRequest {
            caregiver_id: caregiver,
            timestamp: first.scheduled_end,
            latitude: 41.5868,
            longitude: -93.625,
            device_id: "demo-device".to_string(),
            completion_notes: Some("All tasks completed".to_string()),
            client_signature: Some("MH".to_string()),
        },
    )?;
    println!("- Clock-out recorded: {} billable hours", completed.billable_hours);

    if !args.skip_matching {
        println!("\nRanking caregivers for the client");
        let matches = scheduler.rank_caregivers(&MatchRequest {
            client_id: ClientId(DEMO_CLIENT.to_string()),
            required_skills: vec!["PERSONAL_CARE".to_string(), "MEDICATION".to_string()],
            preferred_languages: vec!["Spanish".to_string()],
            gender_preference: None,
            availability_needed: vec![AvailabilityWindow {
                day: DayOfWeek::Monday,
                start: morning,
                end: midday,
            }],
            max_distance_km: Some(25),
        })?;
        for result in &matches {
            println!("- {} scored {}", result.caregiver_id.0, result.match_score);
            for reason in &result.reasons_to_choose {
                println!("    + {reason}");
            }
            for concern in &result.potential_concerns {
                println!("    - {concern}");
            }
        }
    }

    let stats = scheduler.visit_stats(&VisitStatsQuery::default())?;
    println!(
        "\nBook summary: {} visits, {} completed, {:.2} billable hours",
        stats.total_visits, stats.completed_visits, stats.total_billable_hours
    );

    Ok(())
}
