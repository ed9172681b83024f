//! Capacity-bound club allocation.
//!
//! The engine is pure: it takes the accepted applications of a round together
//! with the round's club capacities and returns a partition into allocated and
//! rejected applications. Persisting that partition is the service's job.
//!
//! Applications live in one arena. Two derived indexes drive the passes:
//! applicant -> applications in declared priority order, and club ->
//! applications in the club's evaluation order (evaluator rank ascending with
//! unranked candidates last, then the applicant's own priority, then the
//! application id so the order is total).

mod index;
mod strategy;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationStatus, ClubId, UserId};
use index::CandidateIndex;

/// Accepted application as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub club_id: ClubId,
    pub priority: u32,
    #[serde(default)]
    pub rank: Option<u32>,
}

/// Read-only snapshot consumed by one allocation run. Clubs missing from
/// `capacities` do not participate and never receive a seat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInput {
    pub candidates: Vec<Candidate>,
    pub capacities: BTreeMap<ClubId, u32>,
}

/// How seats are settled across passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    /// Applicant-proposing deferred acceptance: a tentatively seated
    /// applicant can be displaced by a better ranked later proposal and then
    /// continues down their own list.
    #[default]
    DeferredAcceptance,
    /// Settlement is final once taken. Each pass seats an applicant at the
    /// first club whose remaining-capacity window, computed over applicants
    /// still unsettled, contains them.
    SettledWindow,
}

impl AllocationStrategy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DeferredAcceptance => "deferred_acceptance",
            Self::SettledWindow => "settled_window",
        }
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown allocation strategy '{0}' (expected deferred_acceptance or settled_window)")]
pub struct UnknownStrategy(pub String);

impl FromStr for AllocationStrategy {
    type Err = UnknownStrategy;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "deferred_acceptance" | "deferred" => Ok(Self::DeferredAcceptance),
            "settled_window" | "window" => Ok(Self::SettledWindow),
            _ => Err(UnknownStrategy(raw.to_string())),
        }
    }
}

/// Winning application of one applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub club_id: ClubId,
}

/// Partition of the input, both halves sorted by application id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub allocated: Vec<Assignment>,
    pub rejected: Vec<ApplicationId>,
    pub passes: usize,
}

impl AllocationPlan {
    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn seats_by_club(&self) -> BTreeMap<ClubId, usize> {
        let mut seats = BTreeMap::new();
        for assignment in &self.allocated {
            *seats.entry(assignment.club_id.clone()).or_insert(0) += 1;
        }
        seats
    }

    pub fn status_of(&self, id: &ApplicationId) -> Option<ApplicationStatus> {
        if self
            .allocated
            .iter()
            .any(|assignment| &assignment.application_id == id)
        {
            Some(ApplicationStatus::Allocated)
        } else if self.rejected.binary_search(id).is_ok() {
            Some(ApplicationStatus::Rejected)
        } else {
            None
        }
    }

    /// Status writes to persist, allocations first.
    pub fn status_updates(&self) -> Vec<(ApplicationId, ApplicationStatus)> {
        self.allocated
            .iter()
            .map(|assignment| {
                (
                    assignment.application_id.clone(),
                    ApplicationStatus::Allocated,
                )
            })
            .chain(
                self.rejected
                    .iter()
                    .map(|id| (id.clone(), ApplicationStatus::Rejected)),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationEngine {
    strategy: AllocationStrategy,
}

impl AllocationEngine {
    pub fn new(strategy: AllocationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    pub fn run(&self, input: &AllocationInput) -> AllocationPlan {
        let index = CandidateIndex::build(&input.candidates);
        let outcome = match self.strategy {
            AllocationStrategy::DeferredAcceptance => {
                strategy::deferred_acceptance(&index, &input.capacities)
            }
            AllocationStrategy::SettledWindow => {
                strategy::settled_window(&index, &input.capacities)
            }
        };

        let mut allocated = Vec::new();
        let mut rejected = Vec::new();
        for (slot, candidate) in input.candidates.iter().enumerate() {
            if outcome.seated[slot] {
                allocated.push(Assignment {
                    application_id: candidate.application_id.clone(),
                    applicant_id: candidate.applicant_id.clone(),
                    club_id: candidate.club_id.clone(),
                });
            } else {
                rejected.push(candidate.application_id.clone());
            }
        }
        allocated.sort_by(|a, b| a.application_id.cmp(&b.application_id));
        rejected.sort();

        AllocationPlan {
            allocated,
            rejected,
            passes: outcome.passes,
        }
    }
}
