use crate::infra::parse_strategy;
use crate::routes::{preview, PreviewResponse};
use chrono::{Duration, TimeZone, Utc};
use clap::Args;
use club_recruit::config::RecruitmentConfig;
use club_recruit::error::AppError;
use club_recruit::recruitment::{
    Actor, AllocationStrategy, AllocationSummary, AnswerValue, ApplicationStatus, ClubId,
    ClubSlot, CycleStatus, EvaluatorAssignment, FixedClock, FormQuestion,
    InMemoryRecruitmentStore, MemoryAuditLog, NewCycle, NewForm, RecruitmentRepository,
    RecruitmentService, Role, SubmitApplication, UserId,
};
use club_recruit::snapshot;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// CSV export with application_id,applicant_id,club_id,priority,rank
    #[arg(long)]
    pub(crate) candidates: PathBuf,
    /// CSV export with club_id,max_members
    #[arg(long)]
    pub(crate) capacities: PathBuf,
    /// Allocation strategy (deferred_acceptance or settled_window)
    #[arg(long, value_parser = parse_strategy)]
    pub(crate) strategy: Option<AllocationStrategy>,
    /// Print the plan as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Allocation strategy used for the scripted season
    #[arg(long, value_parser = parse_strategy)]
    pub(crate) strategy: Option<AllocationStrategy>,
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let AllocateArgs {
        candidates,
        capacities,
        strategy,
        json,
    } = args;

    let input = snapshot::load_input_from_paths(&candidates, &capacities)?;
    let response = preview(&input, strategy.unwrap_or_default());

    if json {
        match serde_json::to_string_pretty(&response) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => return Err(AppError::Io(std::io::Error::other(err))),
        }
    } else {
        render_plan(&response);
    }
    Ok(())
}

fn render_plan(response: &PreviewResponse) {
    println!("Allocation dry run ({})", response.strategy);
    println!(
        "  allocated: {}  rejected: {}  passes: {}",
        response.allocated_count, response.rejected_count, response.plan.passes
    );
    for (club, seats) in response.plan.seats_by_club() {
        println!("  - {club}: {seats} seat(s)");
    }
    for assignment in &response.plan.allocated {
        println!(
            "    {} -> {} ({})",
            assignment.applicant_id, assignment.club_id, assignment.application_id
        );
    }
    if !response.plan.rejected.is_empty() {
        let rejected: Vec<&str> = response.plan.rejected.iter().map(|id| id.as_str()).collect();
        println!("  rejected applications: {}", rejected.join(", "));
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = RecruitmentConfig {
        allocation_strategy: args.strategy.unwrap_or_default(),
        ..RecruitmentConfig::default()
    };
    let (summary, seats) = scripted_season(config)?;

    println!("Club recruitment demo");
    println!(
        "  cycle {} / {} ({}): {} allocated, {} rejected in {} pass(es)",
        summary.cycle_id,
        summary.round_id,
        summary.strategy,
        summary.allocated_count,
        summary.rejected_count,
        summary.passes
    );
    for (student, club) in seats {
        match club {
            Some(club) => println!("  - {student}: {club}"),
            None => println!("  - {student}: no seat"),
        }
    }
    Ok(())
}

const DEMO_CLUBS: [(&str, u32); 3] = [("orchestra", 2), ("robotics", 1), ("yearbook", 1)];

/// (student, [(club, priority, rank)]) in submission order.
const DEMO_APPLICANTS: [(&str, [(&str, u32, Option<u32>); 2]); 4] = [
    ("ari", [("robotics", 1, Some(2)), ("orchestra", 2, Some(3))]),
    ("bo", [("robotics", 1, Some(1)), ("yearbook", 2, None)]),
    ("cy", [("orchestra", 1, Some(1)), ("robotics", 2, Some(3))]),
    ("di", [("yearbook", 1, Some(1)), ("orchestra", 2, Some(2))]),
];

type Seats = BTreeMap<String, Option<String>>;

/// Drive one season end to end against the in-memory store and return the
/// allocation summary with each student's seat.
fn scripted_season(config: RecruitmentConfig) -> Result<(AllocationSummary, Seats), AppError> {
    let apply_start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single();
    let apply_end = Utc.with_ymd_and_hms(2026, 3, 9, 18, 0, 0).single();
    let (Some(apply_start), Some(apply_end)) = (apply_start, apply_end) else {
        return Err(AppError::Io(std::io::Error::other("invalid demo calendar")));
    };

    let store = Arc::new(InMemoryRecruitmentStore::default());
    let clock = Arc::new(FixedClock::at(apply_start));
    let service = RecruitmentService::new(
        store.clone(),
        Arc::new(MemoryAuditLog::default()),
        clock.clone(),
        config,
    );
    let admin = Actor::new("demo-admin", Role::Admin);

    let (cycle, round) = service.create_cycle(
        &admin,
        NewCycle {
            year: 2026,
            name: "Demo season".to_string(),
            max_applications: None,
            view_start: None,
            apply_start: Some(apply_start),
            apply_end: Some(apply_end),
        },
    )?;
    service.transition_cycle(&admin, &cycle.id, CycleStatus::Open)?;
    service.configure_round_clubs(
        &admin,
        &round.id,
        DEMO_CLUBS
            .iter()
            .map(|(club, max_members)| ClubSlot {
                club_id: ClubId::new(*club),
                max_members: *max_members,
                is_active: true,
            })
            .collect(),
    )?;

    let mut forms = BTreeMap::new();
    for (club, _) in DEMO_CLUBS {
        let form = service.upsert_form(
            &admin,
            NewForm {
                round_id: round.id.clone(),
                club_id: ClubId::new(club),
                questions: vec![FormQuestion {
                    id: "why".to_string(),
                    prompt: "Why do you want to join?".to_string(),
                    required: true,
                }],
                is_active: true,
            },
        )?;
        forms.insert(club, form.id);
        service.assign_evaluator(
            &admin,
            EvaluatorAssignment {
                user_id: UserId::new(format!("{club}-advisor")),
                club_id: ClubId::new(club),
                cycle_id: cycle.id.clone(),
            },
        )?;
    }

    clock.advance(Duration::hours(1));
    let mut reviews = Vec::new();
    for (student, picks) in DEMO_APPLICANTS {
        let actor = Actor::new(student, Role::Student);
        for (club, priority, rank) in picks {
            let Some(form_id) = forms.get(club).cloned() else {
                continue;
            };
            let answers = BTreeMap::from([(
                "why".to_string(),
                AnswerValue::Text(format!("{student} loves {club}")),
            )]);
            let application = service.submit_application(
                &actor,
                SubmitApplication {
                    round_id: round.id.clone(),
                    club_id: ClubId::new(club),
                    form_id,
                    priority,
                    answers,
                },
            )?;
            reviews.push((club, application.id, rank));
        }
    }

    clock.set(apply_end + Duration::hours(1));
    service.transition_cycle(&admin, &cycle.id, CycleStatus::Closed)?;
    service.transition_cycle(&admin, &cycle.id, CycleStatus::Reviewing)?;
    for (club, application_id, rank) in &reviews {
        let advisor = Actor::new(format!("{club}-advisor"), Role::Evaluator);
        service.set_rank(&advisor, application_id, *rank, "")?;
        service.set_status(&advisor, application_id, ApplicationStatus::Accepted)?;
    }

    let summary = service.allocate(&admin, &cycle.id)?;

    let mut seats: Seats = DEMO_APPLICANTS
        .iter()
        .map(|(student, _)| (student.to_string(), None))
        .collect();
    for application in store
        .applications_for_round(&round.id)
        .map_err(club_recruit::recruitment::RecruitmentError::from)?
    {
        if application.status == ApplicationStatus::Allocated {
            seats.insert(
                application.applicant_id.to_string(),
                Some(application.club_id.to_string()),
            );
        }
    }

    Ok((summary, seats))
}
