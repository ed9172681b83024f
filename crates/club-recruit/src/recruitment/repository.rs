use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Actor, ApplicantRank, Application, ApplicationForm, ApplicationId, ApplicationStatus,
    ClubId, Cycle, CycleId, CycleStatus, EvaluatorAssignment, FormId, Round, RoundClubConfig,
    RoundId, UserId,
};

/// Storage abstraction for cycles, rounds, applications, and evaluator ranks.
///
/// Implementations enforce the uniqueness constraints of the record store:
/// (applicant, club, round), (applicant, priority, round), one rank row per
/// application, and one evaluator assignment per (user, club, cycle). The
/// per-round application limit is checked in the same critical section as
/// the uniqueness constraints.
pub trait RecruitmentRepository: Send + Sync {
    /// Fresh identifier, unique across every service sharing this store.
    fn next_id(&self, prefix: &str) -> Result<String, RepositoryError>;

    /// The single cycle that is neither draft nor completed, if any.
    fn active_cycle(&self) -> Result<Option<Cycle>, RepositoryError>;
    fn insert_cycle(&self, cycle: Cycle) -> Result<Cycle, RepositoryError>;
    fn update_cycle(&self, cycle: Cycle) -> Result<(), RepositoryError>;
    fn fetch_cycle(&self, id: &CycleId) -> Result<Option<Cycle>, RepositoryError>;

    fn insert_round(&self, round: Round) -> Result<Round, RepositoryError>;
    fn update_round(&self, round: Round) -> Result<(), RepositoryError>;
    fn fetch_round(&self, id: &RoundId) -> Result<Option<Round>, RepositoryError>;
    /// Removes the round with its club configs, forms, applications and ranks.
    fn delete_round(&self, id: &RoundId) -> Result<(), RepositoryError>;
    /// Rounds of a cycle ordered by ascending round number.
    fn rounds_for_cycle(&self, cycle_id: &CycleId) -> Result<Vec<Round>, RepositoryError>;

    /// Drop every club config of the round, then store the given set.
    fn replace_club_configs(
        &self,
        round_id: &RoundId,
        configs: Vec<RoundClubConfig>,
    ) -> Result<(), RepositoryError>;
    fn club_configs(&self, round_id: &RoundId) -> Result<Vec<RoundClubConfig>, RepositoryError>;

    fn upsert_form(&self, form: ApplicationForm) -> Result<ApplicationForm, RepositoryError>;
    fn fetch_form(&self, id: &FormId) -> Result<Option<ApplicationForm>, RepositoryError>;
    /// Fails with `Conflict` while applications still reference the form.
    fn delete_form(&self, id: &FormId) -> Result<(), RepositoryError>;
    fn form_for(
        &self,
        round_id: &RoundId,
        club_id: &ClubId,
    ) -> Result<Option<ApplicationForm>, RepositoryError>;

    fn insert_assignment(&self, assignment: EvaluatorAssignment) -> Result<(), RepositoryError>;
    fn remove_assignment(&self, assignment: &EvaluatorAssignment) -> Result<(), RepositoryError>;
    fn is_evaluator(
        &self,
        user_id: &UserId,
        club_id: &ClubId,
        cycle_id: &CycleId,
    ) -> Result<bool, RepositoryError>;

    /// Stores the application unless the applicant already holds
    /// `max_per_round` applications in its round.
    fn insert_application(
        &self,
        application: Application,
        max_per_round: u32,
    ) -> Result<Application, RepositoryError>;
    fn fetch_application(&self, id: &ApplicationId)
        -> Result<Option<Application>, RepositoryError>;
    /// Removes the application together with its rank row.
    fn delete_application(&self, id: &ApplicationId) -> Result<(), RepositoryError>;
    fn applications_for_round(&self, round_id: &RoundId)
        -> Result<Vec<Application>, RepositoryError>;
    fn update_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), RepositoryError>;
    /// Applies every update or none of them.
    fn apply_statuses(
        &self,
        updates: &[(ApplicationId, ApplicationStatus)],
    ) -> Result<(), RepositoryError>;

    fn upsert_rank(&self, rank: ApplicantRank) -> Result<(), RepositoryError>;
    fn fetch_rank(&self, id: &ApplicationId) -> Result<Option<ApplicantRank>, RepositoryError>;
    fn ranks_for_round(
        &self,
        round_id: &RoundId,
    ) -> Result<BTreeMap<ApplicationId, ApplicantRank>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for the audit-log collaborator.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// `(actor, action, target, metadata)` tuple describing one state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub actor_id: UserId,
    pub actor_role: String,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        actor: &Actor,
        action: impl Into<String>,
        target_type: impl Into<String>,
        target_id: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor_id: actor.id.clone(),
            actor_role: actor.role.label().to_string(),
            action: action.into(),
            target_type: target_type.into(),
            target_id,
            metadata: BTreeMap::new(),
            recorded_at,
        }
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// Public representation of an application and its evaluator rank.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub club_id: ClubId,
    pub round_id: RoundId,
    pub priority: u32,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Phase of the owning cycle as applicants should read it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_status: Option<CycleStatus>,
}

impl Application {
    pub fn view(&self, rank: Option<&ApplicantRank>) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            applicant_id: self.applicant_id.clone(),
            club_id: self.club_id.clone(),
            round_id: self.round_id.clone(),
            priority: self.priority,
            status: self.status.label(),
            rank: rank.and_then(|row| row.rank),
            note: rank
                .map(|row| row.note.clone())
                .filter(|note| !note.is_empty()),
            cycle_status: None,
        }
    }
}
