use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::RecruitmentConfig;
use crate::recruitment::domain::{
    Actor, AnswerValue, Application, ApplicationId, ApplicationStatus, ClubId, ClubSlot, Cycle,
    CycleStatus, EvaluatorAssignment, FormQuestion, NewCycle, NewForm, Role, Round,
    SubmitApplication, UserId,
};
use crate::recruitment::repository::{AuditError, AuditEvent, AuditSink, RecruitmentRepository};
use crate::recruitment::{
    recruitment_router, FixedClock, InMemoryRecruitmentStore, MemoryAuditLog, RecruitmentService,
};

pub(super) type TestService = RecruitmentService<InMemoryRecruitmentStore, MemoryAuditLog, FixedClock>;

pub(super) const CHESS: &str = "chess";
pub(super) const CHOIR: &str = "choir";
pub(super) const ROBOTICS: &str = "robotics";
pub(super) const DRAMA: &str = "drama";
pub(super) const CHESS_EVALUATOR: &str = "eval-chess";

pub(super) fn apply_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub(super) fn apply_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 9, 18, 0, 0).unwrap()
}

pub(super) fn admin() -> Actor {
    Actor::new("admin-1", Role::Admin)
}

pub(super) fn student(id: &str) -> Actor {
    Actor::new(id, Role::Student)
}

pub(super) fn chess_evaluator() -> Actor {
    Actor::new(CHESS_EVALUATOR, Role::Evaluator)
}

pub(super) fn new_cycle() -> NewCycle {
    NewCycle {
        year: 2026,
        name: "2026 Spring Recruitment".to_string(),
        max_applications: Some(3),
        view_start: None,
        apply_start: Some(apply_start()),
        apply_end: Some(apply_end()),
    }
}

pub(super) fn answers(text: &str) -> BTreeMap<String, AnswerValue> {
    let mut answers = BTreeMap::new();
    answers.insert(
        "motivation".to_string(),
        AnswerValue::Text(text.to_string()),
    );
    answers
}

/// Open cycle with four recruiting clubs, each with a one-question form, and
/// an evaluator assigned to chess. The clock sits inside the apply window.
pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryRecruitmentStore>,
    pub(super) audit: Arc<MemoryAuditLog>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) cycle: Cycle,
    pub(super) round: Round,
}

pub(super) fn harness() -> Harness {
    harness_with(RecruitmentConfig::default())
}

pub(super) fn harness_with(config: RecruitmentConfig) -> Harness {
    let store = Arc::new(InMemoryRecruitmentStore::default());
    let audit = Arc::new(MemoryAuditLog::default());
    let clock = Arc::new(FixedClock::at(apply_start() + Duration::days(1)));
    let service = Arc::new(RecruitmentService::new(
        store.clone(),
        audit.clone(),
        clock.clone(),
        config,
    ));

    let admin = admin();
    let (cycle, round) = service
        .create_cycle(&admin, new_cycle())
        .expect("cycle created");
    let cycle = service
        .transition_cycle(&admin, &cycle.id, CycleStatus::Open)
        .expect("cycle opened");

    let slots = [(CHESS, 1), (CHOIR, 1), (ROBOTICS, 2), (DRAMA, 1)]
        .into_iter()
        .map(|(club, max_members)| ClubSlot {
            club_id: ClubId::new(club),
            max_members,
            is_active: true,
        })
        .collect();
    service
        .configure_round_clubs(&admin, &round.id, slots)
        .expect("clubs configured");

    for club in [CHESS, CHOIR, ROBOTICS, DRAMA] {
        service
            .upsert_form(
                &admin,
                NewForm {
                    round_id: round.id.clone(),
                    club_id: ClubId::new(club),
                    questions: vec![FormQuestion {
                        id: "motivation".to_string(),
                        prompt: "Why this club?".to_string(),
                        required: true,
                    }],
                    is_active: true,
                },
            )
            .expect("form saved");
    }

    service
        .assign_evaluator(
            &admin,
            EvaluatorAssignment {
                user_id: UserId::new(CHESS_EVALUATOR),
                club_id: ClubId::new(CHESS),
                cycle_id: cycle.id.clone(),
            },
        )
        .expect("evaluator assigned");

    Harness {
        service,
        store,
        audit,
        clock,
        cycle,
        round,
    }
}

impl Harness {
    pub(super) fn submission(&self, club: &str, priority: u32) -> SubmitApplication {
        let form = self
            .service
            .club_form(&self.round.id, &ClubId::new(club))
            .expect("form exists");
        SubmitApplication {
            round_id: self.round.id.clone(),
            club_id: ClubId::new(club),
            form_id: form.id,
            priority,
            answers: answers("I have wanted to join for years"),
        }
    }

    pub(super) fn apply(&self, applicant: &str, club: &str, priority: u32) -> Application {
        self.service
            .submit_application(&student(applicant), self.submission(club, priority))
            .expect("application submitted")
    }

    pub(super) fn close_window(&self) {
        self.clock.set(apply_end() + Duration::hours(1));
    }

    /// Close the window and walk the cycle to reviewing.
    pub(super) fn start_review(&self) {
        self.close_window();
        for status in [CycleStatus::Closed, CycleStatus::Reviewing] {
            self.service
                .transition_cycle(&admin(), &self.cycle.id, status)
                .expect("cycle advances");
        }
    }

    pub(super) fn accept(&self, application: &ApplicationId, rank: Option<u32>) {
        let admin = admin();
        self.service
            .set_rank(&admin, application, rank, "")
            .expect("rank stored");
        self.service
            .set_status(&admin, application, ApplicationStatus::Accepted)
            .expect("status stored");
    }

    pub(super) fn status_of(&self, application: &ApplicationId) -> ApplicationStatus {
        self.store
            .fetch_application(application)
            .expect("store readable")
            .expect("application present")
            .status
    }

    pub(super) fn actions(&self) -> Vec<String> {
        self.audit
            .events()
            .into_iter()
            .map(|event| event.action)
            .collect()
    }

    pub(super) fn router(&self) -> axum::Router {
        recruitment_router(self.service.clone())
    }
}

/// Audit sink whose transport is always down.
#[derive(Debug, Default)]
pub(super) struct BrokenAudit;

impl AuditSink for BrokenAudit {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Err(AuditError::Transport("connection refused".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
