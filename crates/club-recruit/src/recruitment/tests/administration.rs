use super::common::*;

use chrono::Duration;

use crate::recruitment::domain::{
    ClubId, CycleStatus, CycleUpdate, EvaluatorAssignment, NewRound, RoundUpdate, UserId,
};
use crate::recruitment::lifecycle::LifecycleViolation;
use crate::recruitment::repository::RecruitmentRepository;
use crate::recruitment::RecruitmentError;

fn chess_assignment(h: &Harness) -> EvaluatorAssignment {
    EvaluatorAssignment {
        user_id: UserId::new(CHESS_EVALUATOR),
        club_id: ClubId::new(CHESS),
        cycle_id: h.cycle.id.clone(),
    }
}

#[test]
fn extending_the_window_reopens_submissions() {
    let h = harness();
    h.close_window();
    assert!(matches!(
        h.service
            .submit_application(&student("kim"), h.submission(CHESS, 1)),
        Err(RecruitmentError::InvalidState(LifecycleViolation::ApplyWindowClosed { .. }))
    ));

    let updated = h
        .service
        .update_cycle(
            &admin(),
            &h.cycle.id,
            CycleUpdate {
                apply_end: Some(apply_end() + Duration::days(2)),
                max_applications: Some(2),
                ..CycleUpdate::default()
            },
        )
        .expect("cycle updated");
    assert_eq!(updated.apply_end, Some(apply_end() + Duration::days(2)));
    assert_eq!(updated.apply_start, Some(apply_start()));
    assert_eq!(updated.max_applications, 2);
    assert_eq!(updated.name, h.cycle.name);
    assert!(h.actions().contains(&"cycle.update".to_string()));

    h.apply("kim", CHESS, 1);
    h.apply("kim", CHOIR, 2);
    match h
        .service
        .submit_application(&student("kim"), h.submission(DRAMA, 3))
    {
        Err(RecruitmentError::Validation(message)) => assert!(message.contains("at most 2")),
        other => panic!("expected the lowered limit, got {other:?}"),
    }
}

#[test]
fn cycle_edits_are_validated_and_admin_only() {
    let h = harness();

    assert!(matches!(
        h.service
            .update_cycle(&student("kim"), &h.cycle.id, CycleUpdate::default()),
        Err(RecruitmentError::PermissionDenied(_))
    ));

    let inverted = CycleUpdate {
        apply_end: Some(apply_start() - Duration::hours(1)),
        ..CycleUpdate::default()
    };
    assert!(matches!(
        h.service.update_cycle(&admin(), &h.cycle.id, inverted),
        Err(RecruitmentError::Validation(_))
    ));
    let blank = CycleUpdate {
        name: Some("  ".to_string()),
        ..CycleUpdate::default()
    };
    assert!(matches!(
        h.service.update_cycle(&admin(), &h.cycle.id, blank),
        Err(RecruitmentError::Validation(_))
    ));

    let stored = h
        .store
        .fetch_cycle(&h.cycle.id)
        .expect("store readable")
        .expect("cycle present");
    assert_eq!(stored.apply_end, Some(apply_end()));
    assert_eq!(stored.name, h.cycle.name);
}

#[test]
fn completed_cycles_cannot_be_edited() {
    let h = harness();
    h.service
        .complete_cycle(&admin(), &h.cycle.id)
        .expect("completed");

    assert!(matches!(
        h.service.update_cycle(
            &admin(),
            &h.cycle.id,
            CycleUpdate {
                name: Some("Renamed".to_string()),
                ..CycleUpdate::default()
            },
        ),
        Err(RecruitmentError::InvalidState(LifecycleViolation::CycleCompleted))
    ));
    assert!(matches!(
        h.service
            .update_round(&admin(), &h.round.id, RoundUpdate::default()),
        Err(RecruitmentError::InvalidState(LifecycleViolation::CycleCompleted))
    ));
}

#[test]
fn rounds_can_be_renamed_rescheduled_and_closed() {
    let h = harness();
    let updated = h
        .service
        .update_round(
            &admin(),
            &h.round.id,
            RoundUpdate {
                name: Some("Spring intake".to_string()),
                ends_at: Some(apply_end() + Duration::days(1)),
                status: Some(CycleStatus::Closed),
                ..RoundUpdate::default()
            },
        )
        .expect("round updated");

    assert_eq!(updated.name, "Spring intake");
    assert_eq!(updated.ends_at, Some(apply_end() + Duration::days(1)));
    assert_eq!(updated.status, CycleStatus::Closed);
    assert_eq!(
        h.store
            .fetch_round(&h.round.id)
            .expect("store readable")
            .expect("round present"),
        updated
    );

    match h.service.update_round(
        &admin(),
        &h.round.id,
        RoundUpdate {
            status: Some(CycleStatus::Completed),
            ..RoundUpdate::default()
        },
    ) {
        Err(RecruitmentError::InvalidState(LifecycleViolation::IllegalTransition {
            from: CycleStatus::Closed,
            to: CycleStatus::Completed,
        })) => {}
        other => panic!("expected illegal round transition, got {other:?}"),
    }

    assert!(matches!(
        h.service.update_round(
            &admin(),
            &h.round.id,
            RoundUpdate {
                starts_at: Some(apply_end() + Duration::days(3)),
                ..RoundUpdate::default()
            },
        ),
        Err(RecruitmentError::Validation(_))
    ));
}

#[test]
fn removed_evaluators_lose_review_access() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.service
        .set_rank(&chess_evaluator(), &application.id, Some(1), "")
        .expect("assigned evaluator ranks");

    h.service
        .remove_evaluator(&admin(), &chess_assignment(&h))
        .expect("assignment removed");
    assert!(h.actions().contains(&"evaluator.remove".to_string()));

    assert!(matches!(
        h.service
            .set_rank(&chess_evaluator(), &application.id, Some(2), ""),
        Err(RecruitmentError::PermissionDenied(_))
    ));
    assert!(matches!(
        h.service
            .application_view(&chess_evaluator(), &application.id),
        Err(RecruitmentError::PermissionDenied(_))
    ));
    let kept = h
        .store
        .fetch_rank(&application.id)
        .expect("store readable")
        .expect("rank kept");
    assert_eq!(kept.rank, Some(1));

    assert!(matches!(
        h.service.remove_evaluator(&admin(), &chess_assignment(&h)),
        Err(RecruitmentError::NotFound { .. })
    ));
    assert!(matches!(
        h.service
            .remove_evaluator(&chess_evaluator(), &chess_assignment(&h)),
        Err(RecruitmentError::PermissionDenied(_))
    ));
}

#[test]
fn deleting_a_round_drops_its_applications() {
    let h = harness();
    let application = h.apply("kim", CHESS, 1);
    h.service
        .set_rank(&admin(), &application.id, Some(1), "")
        .expect("ranked");
    let second = h
        .service
        .create_round(&admin(), &h.cycle.id, NewRound::default())
        .expect("round created");

    h.service
        .delete_round(&admin(), &h.round.id)
        .expect("round deleted");

    assert!(h
        .store
        .fetch_application(&application.id)
        .expect("store readable")
        .is_none());
    assert!(h
        .store
        .fetch_rank(&application.id)
        .expect("store readable")
        .is_none());
    assert!(matches!(
        h.service.club_form(&h.round.id, &ClubId::new(CHESS)),
        Err(RecruitmentError::NotFound { .. })
    ));
    let remaining: Vec<_> = h
        .store
        .rounds_for_cycle(&h.cycle.id)
        .expect("rounds")
        .into_iter()
        .map(|round| round.id)
        .collect();
    assert_eq!(remaining, vec![second.id]);
}

#[test]
fn forms_with_applications_are_kept() {
    let h = harness();
    h.apply("kim", CHESS, 1);
    let chess_form = h
        .service
        .club_form(&h.round.id, &ClubId::new(CHESS))
        .expect("form exists");
    let drama_form = h
        .service
        .club_form(&h.round.id, &ClubId::new(DRAMA))
        .expect("form exists");

    assert!(matches!(
        h.service.delete_form(&admin(), &chess_form.id),
        Err(RecruitmentError::Validation(_))
    ));
    assert!(matches!(
        h.service.delete_form(&student("kim"), &drama_form.id),
        Err(RecruitmentError::PermissionDenied(_))
    ));

    h.service
        .delete_form(&admin(), &drama_form.id)
        .expect("unused form deleted");
    assert!(matches!(
        h.service.club_form(&h.round.id, &ClubId::new(DRAMA)),
        Err(RecruitmentError::NotFound { .. })
    ));
    assert!(h
        .service
        .club_form(&h.round.id, &ClubId::new(CHESS))
        .is_ok());
}
