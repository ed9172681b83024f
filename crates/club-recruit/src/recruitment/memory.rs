//! Mutex-guarded in-memory implementations of the record store and audit
//! sink, used by the service binary and by tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::clock::IdSequence;
use super::domain::{
    ApplicantRank, Application, ApplicationForm, ApplicationId, ApplicationStatus, ClubId,
    Cycle, CycleId, EvaluatorAssignment, FormId, Round, RoundClubConfig, RoundId, UserId,
};
use super::repository::{
    AuditError, AuditEvent, AuditSink, RecruitmentRepository, RepositoryError,
};

/// Matches the retention of the portal's audit log.
pub const AUDIT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct StoreState {
    cycles: BTreeMap<CycleId, Cycle>,
    rounds: BTreeMap<RoundId, Round>,
    club_configs: BTreeMap<RoundId, Vec<RoundClubConfig>>,
    forms: BTreeMap<FormId, ApplicationForm>,
    assignments: Vec<EvaluatorAssignment>,
    applications: BTreeMap<ApplicationId, Application>,
    ranks: BTreeMap<ApplicationId, ApplicantRank>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRecruitmentStore {
    state: Arc<Mutex<StoreState>>,
    failing_batches: Arc<AtomicU32>,
    failing_cycle_writes: Arc<AtomicU32>,
    ids: Arc<IdSequence>,
}

impl InMemoryRecruitmentStore {
    /// Make the next `count` batch status writes fail as unavailable.
    pub fn fail_next_batches(&self, count: u32) {
        self.failing_batches.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` cycle updates fail as unavailable.
    pub fn fail_next_cycle_writes(&self, count: u32) {
        self.failing_cycle_writes.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    fn take_injected_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

impl RecruitmentRepository for InMemoryRecruitmentStore {
    fn next_id(&self, prefix: &str) -> Result<String, RepositoryError> {
        Ok(self.ids.next(prefix))
    }

    fn active_cycle(&self) -> Result<Option<Cycle>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .cycles
            .values()
            .find(|cycle| cycle.status.is_in_progress())
            .cloned())
    }

    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError> {
        let mut state = self.lock()?;
        if state.cycles.contains_key(&cycle.id) {
            return Err(RepositoryError::Conflict(format!("cycle {}", cycle.id)));
        }
        state.cycles.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn update_cycle(&self, cycle: Cycle) -> Result<(), RepositoryError> {
        if Self::take_injected_failure(&self.failing_cycle_writes) {
            return Err(RepositoryError::Unavailable(
                "cycle write interrupted".to_string(),
            ));
        }
        let mut state = self.lock()?;
        match state.cycles.get_mut(&cycle.id) {
            Some(existing) => {
                *existing = cycle;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError> {
        Ok(self.lock()?.cycles.get(id).cloned())
    }

    fn insert_round(&self, round: Round) -> Result<Round, RepositoryError> {
        let mut state = self.lock()?;
        let duplicate_number = state
            .rounds
            .values()
            .any(|existing| existing.cycle_id == round.cycle_id && existing.number == round.number);
        if state.rounds.contains_key(&round.id) || duplicate_number {
            return Err(RepositoryError::Conflict(format!(
                "round {} of cycle {}",
                round.number, round.cycle_id
            )));
        }
        state.rounds.insert(round.id.clone(), round.clone());
        Ok(round)
    }

    fn update_round(&self, round: Round) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.rounds.get_mut(&round.id) {
            Some(existing) => {
                *existing = round;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_round(&self, id: &RoundId) -> Result<Option<Round>, RepositoryError> {
        Ok(self.lock()?.rounds.get(id).cloned())
    }

    fn delete_round(&self, id: &RoundId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.rounds.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.club_configs.remove(id);
        state.forms.retain(|_, form| &form.round_id != id);

        let removed: Vec<ApplicationId> = state
            .applications
            .values()
            .filter(|application| &application.round_id == id)
            .map(|application| application.id.clone())
            .collect();
        for application_id in &removed {
            state.applications.remove(application_id);
            state.ranks.remove(application_id);
        }
        Ok(())
    }

    fn rounds_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Round>, RepositoryError> {
        let state = self.lock()?;
        let mut rounds: Vec<Round> = state
            .rounds
            .values()
            .filter(|round| &round.cycle_id == cycle_id)
            .cloned()
            .collect();
        rounds.sort_by_key(|round| round.number);
        Ok(rounds)
    }

    fn replace_club_configs(
        &self,
        round_id: &RoundId,
        configs: Vec<RoundClubConfig>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.rounds.contains_key(round_id) {
            return Err(RepositoryError::NotFound);
        }
        state.club_configs.insert(round_id.clone(), configs);
        Ok(())
    }

    fn club_configs(&self, round_id: &RoundId) -> Result<Vec<RoundClubConfig>, RepositoryError> {
        Ok(self
            .lock()?
            .club_configs
            .get(round_id)
            .cloned()
            .unwrap_or_default())
    }

    fn upsert_form(&self, form: ApplicationForm) -> Result<ApplicationForm, RepositoryError> {
        let mut state = self.lock()?;
        let existing = state
            .forms
            .values()
            .find(|stored| stored.round_id == form.round_id && stored.club_id == form.club_id)
            .map(|stored| stored.id.clone());

        let stored = match existing {
            Some(id) => ApplicationForm { id, ..form },
            None => form,
        };
        state.forms.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn fetch_form(&self, id: &FormId) -> Result<Option<ApplicationForm>, RepositoryError> {
        Ok(self.lock()?.forms.get(id).cloned())
    }

    fn delete_form(&self, id: &FormId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.forms.contains_key(id) {
            return Err(RepositoryError::NotFound);
        }
        if state
            .applications
            .values()
            .any(|application| &application.form_id == id)
        {
            return Err(RepositoryError::Conflict(format!(
                "form {id} has submitted applications"
            )));
        }
        state.forms.remove(id);
        Ok(())
    }

    fn form_for(
        &self,
        round_id: &RoundId,
        club_id: &ClubId,
    ) -> Result<Option<ApplicationForm>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .forms
            .values()
            .find(|form| &form.round_id == round_id && &form.club_id == club_id)
            .cloned())
    }

    fn insert_assignment(&self, assignment: EvaluatorAssignment) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.assignments.contains(&assignment) {
            return Err(RepositoryError::Conflict(format!(
                "evaluator {} already assigned to {}",
                assignment.user_id, assignment.club_id
            )));
        }
        state.assignments.push(assignment);
        Ok(())
    }

    fn remove_assignment(&self, assignment: &EvaluatorAssignment) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let before = state.assignments.len();
        state.assignments.retain(|existing| existing != assignment);
        if state.assignments.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn is_evaluator(
        &self,
        user_id: &UserId,
        club_id: &ClubId,
        cycle_id: &CycleId,
    ) -> Result<bool, RepositoryError> {
        let state = self.lock()?;
        Ok(state.assignments.iter().any(|assignment| {
            &assignment.user_id == user_id
                && &assignment.club_id == club_id
                && &assignment.cycle_id == cycle_id
        }))
    }

    fn insert_application(
        &self,
        application: Application,
        max_per_round: u32,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.lock()?;
        if state.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict(format!(
                "application {}",
                application.id
            )));
        }

        let mut held = 0;
        for existing in state.applications.values() {
            if existing.applicant_id != application.applicant_id
                || existing.round_id != application.round_id
            {
                continue;
            }
            held += 1;
            if existing.club_id == application.club_id {
                return Err(RepositoryError::Conflict(format!(
                    "applicant already applied to {}",
                    application.club_id
                )));
            }
            if existing.priority == application.priority {
                return Err(RepositoryError::Conflict(format!(
                    "priority {} already used",
                    application.priority
                )));
            }
        }
        if held >= max_per_round {
            return Err(RepositoryError::Conflict(format!(
                "at most {max_per_round} applications per round"
            )));
        }

        state
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn delete_application(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.applications.remove(id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.ranks.remove(id);
        Ok(())
    }

    fn applications_for_round(
        &self,
        round_id: &RoundId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .applications
            .values()
            .filter(|application| &application.round_id == round_id)
            .cloned()
            .collect())
    }

    fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let application = state
            .applications
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        application.status = status;
        Ok(())
    }

    fn apply_statuses(
        &self,
        updates: &[(ApplicationId, ApplicationStatus)],
    ) -> Result<(), RepositoryError> {
        if Self::take_injected_failure(&self.failing_batches) {
            return Err(RepositoryError::Unavailable(
                "batch write interrupted".to_string(),
            ));
        }

        let mut state = self.lock()?;
        if updates
            .iter()
            .any(|(id, _)| !state.applications.contains_key(id))
        {
            return Err(RepositoryError::NotFound);
        }
        for (id, status) in updates {
            if let Some(application) = state.applications.get_mut(id) {
                application.status = *status;
            }
        }
        Ok(())
    }

    fn upsert_rank(&self, rank: ApplicantRank) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.applications.contains_key(&rank.application_id) {
            return Err(RepositoryError::NotFound);
        }
        state.ranks.insert(rank.application_id.clone(), rank);
        Ok(())
    }

    fn fetch_rank(&self, id: &ApplicationId) -> Result<Option<ApplicantRank>, RepositoryError> {
        Ok(self.lock()?.ranks.get(id).cloned())
    }

    fn ranks_for_round(
        &self,
        round_id: &RoundId,
    ) -> Result<BTreeMap<ApplicationId, ApplicantRank>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .ranks
            .iter()
            .filter(|(id, _)| {
                state
                    .applications
                    .get(*id)
                    .map(|application| &application.round_id == round_id)
                    .unwrap_or(false)
            })
            .map(|(id, rank)| (id.clone(), rank.clone()))
            .collect())
    }
}

/// Bounded audit log keeping the most recent entries.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditLog {
    events: Arc<Mutex<VecDeque<AuditEvent>>>,
}

impl MemoryAuditLog {
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditLog {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| AuditError::Transport("audit lock poisoned".to_string()))?;
        events.push_back(event);
        while events.len() > AUDIT_LOG_CAPACITY {
            events.pop_front();
        }
        Ok(())
    }
}
