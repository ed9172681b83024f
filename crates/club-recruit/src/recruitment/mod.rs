//! Club recruitment: cycle lifecycle, application intake, evaluator ranking,
//! and capacity-bound allocation.

pub mod allocation;
pub mod clock;
pub mod domain;
pub mod lifecycle;
pub mod memory;
pub mod ranking;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use allocation::{
    AllocationEngine, AllocationInput, AllocationPlan, AllocationStrategy, Assignment, Candidate,
    UnknownStrategy,
};
pub use clock::{Clock, FixedClock, IdSequence, SystemClock};
pub use domain::{
    Actor, AnswerValue, ApplicantRank, Application, ApplicationForm, ApplicationId,
    ApplicationStatus, ClubId, ClubSlot, Cycle, CycleId, CycleStatus, CycleUpdate,
    EvaluatorAssignment, FormId, FormQuestion, NewCycle, NewForm, NewRound, Role, Round,
    RoundClubConfig, RoundId, RoundUpdate, SubmitApplication, UserId,
};
pub use lifecycle::LifecycleViolation;
pub use memory::{InMemoryRecruitmentStore, MemoryAuditLog};
pub use repository::{
    ApplicationView, AuditError, AuditEvent, AuditSink, RecruitmentRepository, RepositoryError,
};
pub use router::recruitment_router;
pub use service::{AllocationSummary, RecruitmentError, RecruitmentService};
