use super::common::*;

use crate::recruitment::domain::{ApplicationId, ApplicationStatus, Role};
use crate::recruitment::lifecycle::LifecycleViolation;
use crate::recruitment::ranking::MAX_NOTE_CHARS;
use crate::recruitment::repository::RecruitmentRepository;
use crate::recruitment::{Actor, RecruitmentError};

#[test]
fn assigned_evaluator_ranks_during_the_window() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);

    let row = h
        .service
        .set_rank(&chess_evaluator(), &application.id, Some(3), "strong opener")
        .expect("rank stored");
    assert_eq!(row.rank, Some(3));
    assert_eq!(row.ranked_by.as_str(), CHESS_EVALUATOR);
    assert_eq!(row.club_id.as_str(), CHESS);
    assert!(h.actions().contains(&"application.rank".to_string()));
}

#[test]
fn last_writer_wins_and_ties_are_allowed() {
    let h = harness();
    let first = h.apply("kim", CHESS, 1);
    let second = h.apply("lee", CHESS, 1);

    h.service
        .set_rank(&chess_evaluator(), &first.id, Some(4), "")
        .expect("first rank");
    h.service
        .set_rank(&admin(), &first.id, Some(2), "revised")
        .expect("second rank");
    h.service
        .set_rank(&chess_evaluator(), &second.id, Some(2), "")
        .expect("tie allowed");

    let stored = h
        .store
        .fetch_rank(&first.id)
        .expect("store readable")
        .expect("rank present");
    assert_eq!(stored.rank, Some(2));
    assert_eq!(stored.note, "revised");
    assert_eq!(stored.ranked_by.as_str(), "admin-1");
}

#[test]
fn clearing_a_rank_keeps_the_note() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.service
        .set_rank(&chess_evaluator(), &application.id, None, "interview pending")
        .expect("rank cleared");

    let view = h
        .service
        .application_view(&admin(), &application.id)
        .expect("readable");
    assert_eq!(view.rank, None);
    assert_eq!(view.note.as_deref(), Some("interview pending"));
}

#[test]
fn evaluators_of_other_clubs_are_denied() {
    let h = harness();
    let application = h.apply("kim", CHOIR, 1);

    assert!(matches!(
        h.service
            .set_rank(&chess_evaluator(), &application.id, Some(1), ""),
        Err(RecruitmentError::PermissionDenied(_))
    ));
    let stranger = Actor::new("eval-choir", Role::Evaluator);
    assert!(matches!(
        h.service
            .set_status(&stranger, &application.id, ApplicationStatus::Accepted),
        Err(RecruitmentError::PermissionDenied(_))
    ));
}

#[test]
fn zero_rank_and_oversized_notes_are_invalid() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);

    assert!(matches!(
        h.service.set_rank(&admin(), &application.id, Some(0), ""),
        Err(RecruitmentError::Validation(_))
    ));

    let note = "a".repeat(MAX_NOTE_CHARS + 1);
    assert!(matches!(
        h.service.set_rank(&admin(), &application.id, Some(1), note),
        Err(RecruitmentError::Validation(_))
    ));

    let note = "a".repeat(MAX_NOTE_CHARS);
    assert!(h
        .service
        .set_rank(&admin(), &application.id, Some(1), note)
        .is_ok());
}

#[test]
fn status_changes_wait_for_the_window_to_close() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);

    match h
        .service
        .set_status(&chess_evaluator(), &application.id, ApplicationStatus::Accepted)
    {
        Err(RecruitmentError::InvalidState(LifecycleViolation::EvaluationNotStarted {
            opens_at,
        })) => assert_eq!(opens_at, apply_end()),
        other => panic!("expected evaluation not started, got {other:?}"),
    }
    assert_eq!(h.status_of(&application.id), ApplicationStatus::Pending);
    assert!(!h.actions().contains(&"application.status".to_string()));

    h.close_window();
    let updated = h
        .service
        .set_status(&chess_evaluator(), &application.id, ApplicationStatus::Accepted)
        .expect("status updated");
    assert_eq!(updated.status, ApplicationStatus::Accepted);
    assert_eq!(h.status_of(&application.id), ApplicationStatus::Accepted);

    let event = h
        .audit
        .events()
        .into_iter()
        .rev()
        .find(|event| event.action == "application.status")
        .expect("status audited");
    assert_eq!(event.metadata.get("from").map(String::as_str), Some("pending"));
    assert_eq!(event.metadata.get("to").map(String::as_str), Some("accepted"));
}

#[test]
fn allocated_status_is_reserved_for_allocation() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.close_window();

    assert!(matches!(
        h.service
            .set_status(&admin(), &application.id, ApplicationStatus::Allocated),
        Err(RecruitmentError::Validation(_))
    ));
}

#[test]
fn unknown_application_is_not_found() {
    let h = harness();
    assert!(matches!(
        h.service
            .set_rank(&admin(), &ApplicationId::new("ghost"), Some(1), ""),
        Err(RecruitmentError::NotFound { .. })
    ));
}
