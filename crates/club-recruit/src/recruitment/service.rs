use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::allocation::{
    AllocationEngine, AllocationInput, AllocationPlan, AllocationStrategy, Candidate,
};
use super::clock::{Clock, SystemClock};
use super::domain::{
    Actor, Application, ApplicationForm, ApplicationId, ApplicationStatus, ClubId, ClubSlot,
    Cycle, CycleId, CycleStatus, CycleUpdate, EvaluatorAssignment, FormId, NewCycle, NewForm,
    NewRound, Role, Round, RoundClubConfig, RoundId, RoundUpdate, SubmitApplication,
};
use super::lifecycle::{self, LifecycleViolation};
use super::repository::{
    ApplicationView, AuditEvent, AuditSink, RecruitmentRepository, RepositoryError,
};
use crate::config::RecruitmentConfig;

/// Service composing the record store, lifecycle gates, ranking, and the
/// allocation engine.
pub struct RecruitmentService<R, A, C = SystemClock> {
    pub(super) repository: Arc<R>,
    pub(super) audit: Arc<A>,
    pub(super) clock: Arc<C>,
    engine: AllocationEngine,
    config: RecruitmentConfig,
}

/// Result of one allocation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub cycle_id: CycleId,
    pub round_id: RoundId,
    pub strategy: AllocationStrategy,
    pub allocated_count: usize,
    pub rejected_count: usize,
    pub passes: usize,
}

impl<R, A, C> RecruitmentService<R, A, C>
where
    R: RecruitmentRepository + 'static,
    A: AuditSink + 'static,
    C: Clock + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<A>, clock: Arc<C>, config: RecruitmentConfig) -> Self {
        Self {
            engine: AllocationEngine::new(config.allocation_strategy),
            repository,
            audit,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RecruitmentConfig {
        &self.config
    }

    /// Create a draft cycle together with its first round.
    pub fn create_cycle(
        &self,
        actor: &Actor,
        request: NewCycle,
    ) -> Result<(Cycle, Round), RecruitmentError> {
        require_admin(actor, "create cycles")?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(RecruitmentError::Validation(
                "cycle name is required".to_string(),
            ));
        }
        let max_applications = request
            .max_applications
            .unwrap_or(self.config.default_max_applications);
        if max_applications == 0 {
            return Err(RecruitmentError::Validation(
                "max applications must be at least 1".to_string(),
            ));
        }
        check_window(request.apply_start, request.apply_end, "apply")?;
        if self.repository.active_cycle()?.is_some() {
            return Err(LifecycleViolation::ActiveCycleExists.into());
        }

        let cycle = self.repository.insert_cycle(Cycle {
            id: CycleId::new(self.repository.next_id("cycle")?),
            year: request.year,
            name,
            max_applications,
            view_start: request.view_start,
            apply_start: request.apply_start,
            apply_end: request.apply_end,
            status: CycleStatus::Draft,
        })?;

        let round = self.repository.insert_round(Round {
            id: RoundId::new(self.repository.next_id("round")?),
            cycle_id: cycle.id.clone(),
            number: 1,
            name: "Round 1".to_string(),
            starts_at: cycle.apply_start,
            ends_at: cycle.apply_end,
            status: CycleStatus::Draft,
        })?;

        self.record(
            AuditEvent::new(
                actor,
                "cycle.create",
                "Cycle",
                Some(cycle.id.to_string()),
                self.clock.now(),
            )
            .with("year", cycle.year)
            .with("max_applications", cycle.max_applications),
        );

        Ok((cycle, round))
    }

    /// Administrator status change. The new status is mirrored onto every
    /// round of the cycle.
    pub fn transition_cycle(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        next: CycleStatus,
    ) -> Result<Cycle, RecruitmentError> {
        require_admin(actor, "change cycle status")?;
        let mut cycle = self.load_cycle(cycle_id)?;
        lifecycle::check_transition(cycle.status, next)?;

        if !cycle.status.is_in_progress() && next.is_in_progress() {
            let other_active = self
                .repository
                .active_cycle()?
                .filter(|active| &active.id != cycle_id);
            if other_active.is_some() {
                return Err(LifecycleViolation::ActiveCycleExists.into());
            }
        }

        let previous = cycle.status;
        cycle.status = next;
        self.repository.update_cycle(cycle.clone())?;
        self.mirror_rounds(cycle_id, next)?;

        self.record(
            AuditEvent::new(
                actor,
                "cycle.transition",
                "Cycle",
                Some(cycle_id.to_string()),
                self.clock.now(),
            )
            .with("from", previous)
            .with("to", next),
        );
        info!(cycle = %cycle_id, from = %previous, to = %next, "cycle status changed");

        Ok(cycle)
    }

    /// Edit the name, application limit or calendar of a cycle that is not
    /// yet completed. Window gates read the new instants immediately.
    pub fn update_cycle(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        update: CycleUpdate,
    ) -> Result<Cycle, RecruitmentError> {
        require_admin(actor, "edit cycles")?;
        let mut cycle = self.load_cycle(cycle_id)?;
        lifecycle::completion_gate(&cycle)?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(RecruitmentError::Validation(
                    "cycle name is required".to_string(),
                ));
            }
            cycle.name = name;
        }
        if let Some(max_applications) = update.max_applications {
            if max_applications == 0 {
                return Err(RecruitmentError::Validation(
                    "max applications must be at least 1".to_string(),
                ));
            }
            cycle.max_applications = max_applications;
        }
        if update.view_start.is_some() {
            cycle.view_start = update.view_start;
        }
        if update.apply_start.is_some() {
            cycle.apply_start = update.apply_start;
        }
        if update.apply_end.is_some() {
            cycle.apply_end = update.apply_end;
        }
        check_window(cycle.apply_start, cycle.apply_end, "apply")?;

        self.repository.update_cycle(cycle.clone())?;

        let mut event = AuditEvent::new(
            actor,
            "cycle.update",
            "Cycle",
            Some(cycle_id.to_string()),
            self.clock.now(),
        )
        .with("max_applications", cycle.max_applications);
        if let Some(apply_end) = cycle.apply_end {
            event = event.with("apply_end", apply_end.to_rfc3339());
        }
        self.record(event);
        info!(cycle = %cycle_id, "cycle updated");

        Ok(cycle)
    }

    /// Irreversibly close the cycle and all of its rounds.
    pub fn complete_cycle(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
    ) -> Result<Cycle, RecruitmentError> {
        require_admin(actor, "complete cycles")?;
        let mut cycle = self.load_cycle(cycle_id)?;
        lifecycle::completion_gate(&cycle)?;

        let previous = cycle.status;
        cycle.status = CycleStatus::Completed;
        self.repository.update_cycle(cycle.clone())?;
        self.mirror_rounds(cycle_id, CycleStatus::Completed)?;

        self.record(
            AuditEvent::new(
                actor,
                "cycle.complete",
                "Cycle",
                Some(cycle_id.to_string()),
                self.clock.now(),
            )
            .with("from", previous),
        );
        info!(cycle = %cycle_id, "cycle completed");

        Ok(cycle)
    }

    pub fn create_round(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
        request: NewRound,
    ) -> Result<Round, RecruitmentError> {
        require_admin(actor, "create rounds")?;
        let cycle = self.load_cycle(cycle_id)?;
        lifecycle::completion_gate(&cycle)?;

        let number = self
            .repository
            .rounds_for_cycle(cycle_id)?
            .last()
            .map(|round| round.number + 1)
            .unwrap_or(1);
        let name = request
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Round {number}"));
        check_window(request.starts_at, request.ends_at, "round")?;

        let round = self.repository.insert_round(Round {
            id: RoundId::new(self.repository.next_id("round")?),
            cycle_id: cycle_id.clone(),
            number,
            name,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            status: cycle.status,
        })?;

        self.record(
            AuditEvent::new(
                actor,
                "round.create",
                "Round",
                Some(round.id.to_string()),
                self.clock.now(),
            )
            .with("number", round.number),
        );

        Ok(round)
    }

    pub fn update_round(
        &self,
        actor: &Actor,
        round_id: &RoundId,
        update: RoundUpdate,
    ) -> Result<Round, RecruitmentError> {
        require_admin(actor, "edit rounds")?;
        let mut round = self.load_round(round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        lifecycle::completion_gate(&cycle)?;

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(RecruitmentError::Validation(
                    "round name is required".to_string(),
                ));
            }
            round.name = name;
        }
        if update.starts_at.is_some() {
            round.starts_at = update.starts_at;
        }
        if update.ends_at.is_some() {
            round.ends_at = update.ends_at;
        }
        check_window(round.starts_at, round.ends_at, "round")?;

        let previous = round.status;
        if let Some(next) = update.status.filter(|next| *next != round.status) {
            lifecycle::check_transition(round.status, next)?;
            round.status = next;
        }

        self.repository.update_round(round.clone())?;
        self.record(
            AuditEvent::new(
                actor,
                "round.update",
                "Round",
                Some(round_id.to_string()),
                self.clock.now(),
            )
            .with("from", previous)
            .with("to", round.status),
        );

        Ok(round)
    }

    /// Drop a round together with everything submitted to it. Rounds holding
    /// allocation results are kept.
    pub fn delete_round(&self, actor: &Actor, round_id: &RoundId) -> Result<(), RecruitmentError> {
        require_admin(actor, "delete rounds")?;
        let round = self.load_round(round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        lifecycle::ranking_gate(&cycle, self.round_allocated(round_id)?)?;

        self.repository.delete_round(round_id)?;
        self.record(
            AuditEvent::new(
                actor,
                "round.delete",
                "Round",
                Some(round_id.to_string()),
                self.clock.now(),
            )
            .with("cycle_id", &round.cycle_id)
            .with("number", round.number),
        );
        info!(cycle = %round.cycle_id, round = %round_id, "round deleted");
        Ok(())
    }

    /// Replace the round's club set wholesale. Inactive slots are dropped.
    pub fn configure_round_clubs(
        &self,
        actor: &Actor,
        round_id: &RoundId,
        slots: Vec<ClubSlot>,
    ) -> Result<Vec<RoundClubConfig>, RecruitmentError> {
        require_admin(actor, "configure round clubs")?;
        let round = self.load_round(round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        lifecycle::ranking_gate(&cycle, self.round_allocated(round_id)?)?;

        let mut seen = BTreeSet::new();
        let mut configs = Vec::new();
        for slot in slots.into_iter().filter(|slot| slot.is_active) {
            if slot.max_members == 0 {
                return Err(RecruitmentError::Validation(format!(
                    "club {} needs a capacity of at least 1",
                    slot.club_id
                )));
            }
            if !seen.insert(slot.club_id.clone()) {
                return Err(RecruitmentError::Validation(format!(
                    "club {} listed twice",
                    slot.club_id
                )));
            }
            configs.push(RoundClubConfig {
                round_id: round_id.clone(),
                club_id: slot.club_id,
                max_members: slot.max_members,
                is_active: true,
            });
        }

        self.repository
            .replace_club_configs(round_id, configs.clone())?;

        self.record(
            AuditEvent::new(
                actor,
                "round.configure_clubs",
                "Round",
                Some(round_id.to_string()),
                self.clock.now(),
            )
            .with("clubs", configs.len()),
        );

        Ok(configs)
    }

    pub fn upsert_form(
        &self,
        actor: &Actor,
        request: NewForm,
    ) -> Result<ApplicationForm, RecruitmentError> {
        require_admin(actor, "manage application forms")?;
        let round = self.load_round(&request.round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        lifecycle::completion_gate(&cycle)?;

        let mut question_ids = BTreeSet::new();
        for question in &request.questions {
            if question.id.trim().is_empty() {
                return Err(RecruitmentError::Validation(
                    "question id is required".to_string(),
                ));
            }
            if !question_ids.insert(question.id.as_str()) {
                return Err(RecruitmentError::Validation(format!(
                    "question {} listed twice",
                    question.id
                )));
            }
        }

        let form = self.repository.upsert_form(ApplicationForm {
            id: FormId::new(self.repository.next_id("form")?),
            round_id: request.round_id,
            club_id: request.club_id,
            questions: request.questions,
            is_active: request.is_active,
        })?;

        Ok(form)
    }

    /// Forms that already collected applications cannot be removed.
    pub fn delete_form(&self, actor: &Actor, form_id: &FormId) -> Result<(), RecruitmentError> {
        require_admin(actor, "manage application forms")?;
        let form = self
            .repository
            .fetch_form(form_id)?
            .ok_or_else(|| not_found("form", form_id))?;
        let round = self.load_round(&form.round_id)?;
        lifecycle::completion_gate(&self.load_cycle(&round.cycle_id)?)?;

        match self.repository.delete_form(form_id) {
            Ok(()) => {}
            Err(RepositoryError::Conflict(detail)) => {
                return Err(RecruitmentError::Validation(detail));
            }
            Err(other) => return Err(other.into()),
        }

        self.record(
            AuditEvent::new(
                actor,
                "form.delete",
                "Form",
                Some(form_id.to_string()),
                self.clock.now(),
            )
            .with("club_id", &form.club_id),
        );
        Ok(())
    }

    /// Form an applicant fills in for one club of a round.
    pub fn club_form(
        &self,
        round_id: &RoundId,
        club_id: &ClubId,
    ) -> Result<ApplicationForm, RecruitmentError> {
        self.repository
            .form_for(round_id, club_id)?
            .ok_or_else(|| not_found("form", format!("{round_id}/{club_id}")))
    }

    pub fn assign_evaluator(
        &self,
        actor: &Actor,
        assignment: EvaluatorAssignment,
    ) -> Result<(), RecruitmentError> {
        require_admin(actor, "assign evaluators")?;
        self.load_cycle(&assignment.cycle_id)?;

        let target = assignment.user_id.to_string();
        let club = assignment.club_id.to_string();
        match self.repository.insert_assignment(assignment) {
            Ok(()) => {}
            Err(RepositoryError::Conflict(detail)) => {
                return Err(RecruitmentError::Validation(detail));
            }
            Err(other) => return Err(other.into()),
        }

        self.record(
            AuditEvent::new(
                actor,
                "evaluator.assign",
                "User",
                Some(target),
                self.clock.now(),
            )
            .with("club_id", club),
        );
        Ok(())
    }

    /// Withdraw review authority. Ranks the evaluator already wrote stay.
    pub fn remove_evaluator(
        &self,
        actor: &Actor,
        assignment: &EvaluatorAssignment,
    ) -> Result<(), RecruitmentError> {
        require_admin(actor, "remove evaluators")?;
        match self.repository.remove_assignment(assignment) {
            Ok(()) => {}
            Err(RepositoryError::NotFound) => {
                return Err(not_found(
                    "evaluator assignment",
                    format!(
                        "{}/{}/{}",
                        assignment.cycle_id, assignment.club_id, assignment.user_id
                    ),
                ));
            }
            Err(other) => return Err(other.into()),
        }

        self.record(
            AuditEvent::new(
                actor,
                "evaluator.remove",
                "User",
                Some(assignment.user_id.to_string()),
                self.clock.now(),
            )
            .with("club_id", &assignment.club_id)
            .with("cycle_id", &assignment.cycle_id),
        );
        Ok(())
    }

    /// Submit an application while the calendar window is open.
    pub fn submit_application(
        &self,
        actor: &Actor,
        request: SubmitApplication,
    ) -> Result<Application, RecruitmentError> {
        if actor.role == Role::Teacher {
            return Err(RecruitmentError::PermissionDenied(
                "teacher accounts cannot apply".to_string(),
            ));
        }
        if request.priority == 0 {
            return Err(RecruitmentError::Validation(
                "priority starts at 1".to_string(),
            ));
        }

        let round = self.load_round(&request.round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        let now = self.clock.now();
        lifecycle::submission_window(&cycle, now)?;

        let existing: Vec<Application> = self
            .repository
            .applications_for_round(&round.id)?
            .into_iter()
            .filter(|application| application.applicant_id == actor.id)
            .collect();
        if existing.len() >= cycle.max_applications as usize {
            return Err(RecruitmentError::Validation(format!(
                "at most {} applications per round",
                cycle.max_applications
            )));
        }
        if existing
            .iter()
            .any(|application| application.club_id == request.club_id)
        {
            return Err(RecruitmentError::Validation(format!(
                "already applied to {}",
                request.club_id
            )));
        }
        if existing
            .iter()
            .any(|application| application.priority == request.priority)
        {
            return Err(RecruitmentError::Validation(format!(
                "priority {} already used in this round",
                request.priority
            )));
        }

        let form = self
            .repository
            .fetch_form(&request.form_id)?
            .ok_or_else(|| not_found("form", &request.form_id))?;
        if form.round_id != round.id || form.club_id != request.club_id {
            return Err(RecruitmentError::Validation(
                "form does not belong to this club and round".to_string(),
            ));
        }
        if !form.is_active {
            return Err(LifecycleViolation::FormInactive.into());
        }

        let recruiting = self
            .repository
            .club_configs(&round.id)?
            .iter()
            .any(|config| config.club_id == request.club_id && config.is_active);
        if !recruiting {
            return Err(RecruitmentError::Validation(format!(
                "{} is not recruiting in this round",
                request.club_id
            )));
        }

        let mut answers = request.answers;
        answers.retain(|question_id, _| form.questions.iter().any(|q| &q.id == question_id));
        if let Some(missing) = form.questions.iter().find(|question| {
            question.required
                && answers
                    .get(&question.id)
                    .map(|answer| answer.is_blank())
                    .unwrap_or(true)
        }) {
            return Err(RecruitmentError::Validation(format!(
                "question {} requires an answer",
                missing.id
            )));
        }

        let application = Application {
            id: ApplicationId::new(self.repository.next_id("app")?),
            applicant_id: actor.id.clone(),
            club_id: request.club_id,
            round_id: round.id,
            form_id: form.id,
            priority: request.priority,
            status: ApplicationStatus::Pending,
            answers,
            created_at: now,
        };
        let stored = match self
            .repository
            .insert_application(application, cycle.max_applications)
        {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict(detail)) => {
                return Err(RecruitmentError::Validation(detail));
            }
            Err(other) => return Err(other.into()),
        };

        self.record(
            AuditEvent::new(
                actor,
                "application.submit",
                "Application",
                Some(stored.id.to_string()),
                now,
            )
            .with("club_id", &stored.club_id)
            .with("priority", stored.priority),
        );

        Ok(stored)
    }

    /// Owner-only withdrawal until the application window closes.
    pub fn cancel_application(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<(), RecruitmentError> {
        let application = self.load_application(application_id)?;
        if application.applicant_id != actor.id {
            return Err(RecruitmentError::PermissionDenied(
                "only the applicant can cancel an application".to_string(),
            ));
        }

        let round = self.load_round(&application.round_id)?;
        let cycle = self.load_cycle(&round.cycle_id)?;
        let now = self.clock.now();
        lifecycle::cancellation_window(&cycle, now)?;

        self.repository.delete_application(application_id)?;
        self.record(
            AuditEvent::new(
                actor,
                "application.cancel",
                "Application",
                Some(application_id.to_string()),
                now,
            )
            .with("club_id", &application.club_id),
        );
        Ok(())
    }

    /// Application with its rank, visible to the owner, an assigned evaluator,
    /// or an administrator.
    pub fn application_view(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
    ) -> Result<ApplicationView, RecruitmentError> {
        let application = self.load_application(application_id)?;
        let round = self.load_round(&application.round_id)?;
        if application.applicant_id != actor.id {
            self.authorize_reviewer(actor, &application.club_id, &round.cycle_id)?;
        }
        let cycle = self.load_cycle(&round.cycle_id)?;
        let rank = self.repository.fetch_rank(application_id)?;

        let mut view = application.view(rank.as_ref());
        view.cycle_status = Some(lifecycle::effective_status(&cycle, self.clock.now()));
        Ok(view)
    }

    /// Applications of a round ordered by club then priority. Evaluators must
    /// name the club they review.
    pub fn round_applications(
        &self,
        actor: &Actor,
        round_id: &RoundId,
        club_id: Option<&ClubId>,
    ) -> Result<Vec<ApplicationView>, RecruitmentError> {
        let round = self.load_round(round_id)?;
        match club_id {
            Some(club_id) => self.authorize_reviewer(actor, club_id, &round.cycle_id)?,
            None => require_admin(actor, "list every application of a round")?,
        }

        let ranks = self.repository.ranks_for_round(round_id)?;
        let mut applications: Vec<Application> = self
            .repository
            .applications_for_round(round_id)?
            .into_iter()
            .filter(|application| club_id.map_or(true, |club| &application.club_id == club))
            .collect();
        applications.sort_by(|a, b| {
            a.club_id
                .cmp(&b.club_id)
                .then(a.priority.cmp(&b.priority))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(applications
            .iter()
            .map(|application| application.view(ranks.get(&application.id)))
            .collect())
    }

    /// Run the allocation engine against the cycle's latest round and persist
    /// the resulting partition in one batch.
    pub fn allocate(
        &self,
        actor: &Actor,
        cycle_id: &CycleId,
    ) -> Result<AllocationSummary, RecruitmentError> {
        require_admin(actor, "allocate members")?;
        let cycle = self.load_cycle(cycle_id)?;
        let round = self
            .repository
            .rounds_for_cycle(cycle_id)?
            .pop()
            .ok_or_else(|| RecruitmentError::NoEligibleRound(cycle_id.clone()))?;
        lifecycle::allocation_gate(&cycle)?;

        let input = self.allocation_input(&round)?;
        debug!(
            cycle = %cycle_id,
            round = %round.id,
            candidates = input.candidates.len(),
            clubs = input.capacities.len(),
            "allocation snapshot loaded"
        );

        let plan = self.engine.run(&input);
        self.write_statuses(&plan)?;

        let now = self.clock.now();
        for (application_id, status) in plan.status_updates() {
            self.record(
                AuditEvent::new(
                    actor,
                    "application.allocate",
                    "Application",
                    Some(application_id.to_string()),
                    now,
                )
                .with("status", status),
            );
        }

        let summary = AllocationSummary {
            cycle_id: cycle_id.clone(),
            round_id: round.id,
            strategy: self.engine.strategy(),
            allocated_count: plan.allocated_count(),
            rejected_count: plan.rejected_count(),
            passes: plan.passes,
        };
        self.record(
            AuditEvent::new(
                actor,
                "cycle.allocate",
                "Cycle",
                Some(cycle_id.to_string()),
                now,
            )
            .with("round_id", &summary.round_id)
            .with("allocated", summary.allocated_count)
            .with("rejected", summary.rejected_count),
        );

        // Results are saved at this point; a failed phase change is left for
        // the next run, which sees no accepted candidates and retries it.
        if cycle.status == CycleStatus::Reviewing {
            if let Err(err) = self.enter_allocating(cycle) {
                warn!(cycle = %cycle_id, error = %err, "cycle left in reviewing after allocation");
            }
        }
        info!(
            cycle = %cycle_id,
            round = %summary.round_id,
            strategy = %summary.strategy,
            allocated = summary.allocated_count,
            rejected = summary.rejected_count,
            passes = summary.passes,
            "allocation applied"
        );

        Ok(summary)
    }

    fn allocation_input(&self, round: &Round) -> Result<AllocationInput, RecruitmentError> {
        let ranks = self.repository.ranks_for_round(&round.id)?;
        let capacities = self
            .repository
            .club_configs(&round.id)?
            .into_iter()
            .filter(|config| config.is_active)
            .map(|config| (config.club_id, config.max_members))
            .collect();

        let candidates = self
            .repository
            .applications_for_round(&round.id)?
            .into_iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .map(|application| Candidate {
                rank: ranks.get(&application.id).and_then(|row| row.rank),
                application_id: application.id,
                applicant_id: application.applicant_id,
                club_id: application.club_id,
                priority: application.priority,
            })
            .collect();

        Ok(AllocationInput {
            candidates,
            capacities,
        })
    }

    /// The batch is all-or-nothing in the store; an unavailable store is
    /// retried with the identical batch before surfacing the error.
    fn write_statuses(&self, plan: &AllocationPlan) -> Result<(), RecruitmentError> {
        let updates = plan.status_updates();
        let mut attempt = 0;
        loop {
            match self.repository.apply_statuses(&updates) {
                Ok(()) => return Ok(()),
                Err(RepositoryError::Unavailable(reason)) if attempt < self.config.write_retries => {
                    attempt += 1;
                    warn!(attempt, %reason, "retrying allocation status batch");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn enter_allocating(&self, mut cycle: Cycle) -> Result<(), RecruitmentError> {
        let cycle_id = cycle.id.clone();
        cycle.status = CycleStatus::Allocating;
        self.repository.update_cycle(cycle)?;
        self.mirror_rounds(&cycle_id, CycleStatus::Allocating)
    }

    fn mirror_rounds(&self, cycle_id: &CycleId, status: CycleStatus) -> Result<(), RecruitmentError> {
        for mut round in self.repository.rounds_for_cycle(cycle_id)? {
            round.status = status;
            self.repository.update_round(round)?;
        }
        Ok(())
    }

    pub(super) fn round_allocated(&self, round_id: &RoundId) -> Result<bool, RecruitmentError> {
        Ok(self
            .repository
            .applications_for_round(round_id)?
            .iter()
            .any(|application| application.status == ApplicationStatus::Allocated))
    }

    /// Administrators, or any user assigned to review the club in the cycle.
    pub(super) fn authorize_reviewer(
        &self,
        actor: &Actor,
        club_id: &ClubId,
        cycle_id: &CycleId,
    ) -> Result<(), RecruitmentError> {
        if actor.is_admin() || self.repository.is_evaluator(&actor.id, club_id, cycle_id)? {
            Ok(())
        } else {
            Err(RecruitmentError::PermissionDenied(format!(
                "not an evaluator for {club_id}"
            )))
        }
    }

    pub(super) fn load_cycle(&self, id: &CycleId) -> Result<Cycle, RecruitmentError> {
        self.repository
            .fetch_cycle(id)?
            .ok_or_else(|| not_found("cycle", id))
    }

    pub(super) fn load_round(&self, id: &RoundId) -> Result<Round, RecruitmentError> {
        self.repository
            .fetch_round(id)?
            .ok_or_else(|| not_found("round", id))
    }

    pub(super) fn load_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Application, RecruitmentError> {
        self.repository
            .fetch_application(id)?
            .ok_or_else(|| not_found("application", id))
    }

    /// Audit delivery never fails the operation that produced the event.
    pub(super) fn record(&self, event: AuditEvent) {
        if let Err(err) = self.audit.record(event) {
            warn!(error = %err, "audit event dropped");
        }
    }
}

pub(super) fn require_admin(actor: &Actor, action: &str) -> Result<(), RecruitmentError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(RecruitmentError::PermissionDenied(format!(
            "only administrators may {action}"
        )))
    }
}

fn check_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    label: &str,
) -> Result<(), RecruitmentError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(RecruitmentError::Validation(format!(
            "{label} end must not precede {label} start"
        ))),
        _ => Ok(()),
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> RecruitmentError {
    RecruitmentError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Error raised by the recruitment service.
#[derive(Debug, thiserror::Error)]
pub enum RecruitmentError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    InvalidState(#[from] LifecycleViolation),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("cycle {0} has no round to allocate")]
    NoEligibleRound(CycleId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
