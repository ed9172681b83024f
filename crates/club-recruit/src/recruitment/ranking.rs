use tracing::debug;

use super::clock::Clock;
use super::domain::{
    Actor, ApplicantRank, Application, ApplicationId, ApplicationStatus, Cycle,
};
use super::lifecycle::{self, LifecycleViolation};
use super::repository::{AuditEvent, AuditSink, RecruitmentRepository};
use super::service::{RecruitmentError, RecruitmentService};

pub const MAX_NOTE_CHARS: usize = 2000;

/// Application under review together with the state the gates need.
struct Review {
    application: Application,
    cycle: Cycle,
    round_locked: bool,
}

impl<R, A, C> RecruitmentService<R, A, C>
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    /// Upsert the evaluator's rank and note. Lower ranks are better, ties are
    /// allowed, and the last writer wins.
    pub fn set_rank(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        rank: Option<u32>,
        note: impl Into<String>,
    ) -> Result<ApplicantRank, RecruitmentError> {
        let review = self.open_review(actor, application_id)?;

        let note = note.into();
        if rank == Some(0) {
            return Err(RecruitmentError::Validation(
                "rank starts at 1".to_string(),
            ));
        }
        if note.chars().count() > MAX_NOTE_CHARS {
            return Err(RecruitmentError::Validation(format!(
                "note exceeds {MAX_NOTE_CHARS} characters"
            )));
        }

        lifecycle::ranking_gate(&review.cycle, review.round_locked)?;
        if review.application.status == ApplicationStatus::Allocated {
            return Err(LifecycleViolation::RoundAllocated.into());
        }

        let now = self.clock.now();
        let row = ApplicantRank {
            application_id: application_id.clone(),
            club_id: review.application.club_id.clone(),
            rank,
            note,
            ranked_by: actor.id.clone(),
            updated_at: now,
        };
        self.repository.upsert_rank(row.clone())?;

        let mut event = AuditEvent::new(
            actor,
            "application.rank",
            "Application",
            Some(application_id.to_string()),
            now,
        );
        if let Some(rank) = rank {
            event = event.with("rank", rank);
        }
        self.record(event);
        debug!(application = %application_id, ?rank, "rank recorded");

        Ok(row)
    }

    /// Evaluator decision on an application. `Allocated` is reserved for the
    /// allocation run.
    pub fn set_status(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RecruitmentError> {
        let review = self.open_review(actor, application_id)?;

        if status == ApplicationStatus::Allocated {
            return Err(RecruitmentError::Validation(
                "allocated status is assigned by the allocation run".to_string(),
            ));
        }

        let now = self.clock.now();
        lifecycle::evaluation_gate(&review.cycle, review.round_locked, now)?;
        if review.application.status == ApplicationStatus::Allocated {
            return Err(LifecycleViolation::RoundAllocated.into());
        }

        let previous = review.application.status;
        self.repository.update_status(application_id, status)?;

        self.record(
            AuditEvent::new(
                actor,
                "application.status",
                "Application",
                Some(application_id.to_string()),
                now,
            )
            .with("from", previous)
            .with("to", status),
        );

        Ok(Application {
            status,
            ..review.application
        })
    }

    fn open_review(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<Review, RecruitmentError> {
        let application = self.load_application(application_id)?;
        let round = self.load_round(&application.round_id)?;
        self.authorize_reviewer(actor, &application.club_id, &round.cycle_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        let round_locked = self.round_allocated(&round.id)?;

        Ok(Review {
            application,
            cycle,
            round_locked,
        })
    }
}
