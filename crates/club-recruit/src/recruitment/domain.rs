use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a recruitment season.
    CycleId
);
string_id!(
    /// Identifier of a numbered round inside a cycle.
    RoundId
);
string_id!(
    /// Identifier of a recruiting club.
    ClubId
);
string_id!(
    /// Identifier of a portal user (applicant, evaluator, or administrator).
    UserId
);
string_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
string_id!(FormId);

/// Portal role attached to the caller of every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Evaluator,
    Student,
    Teacher,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Evaluator => "evaluator",
            Self::Student => "student",
            Self::Teacher => "teacher",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "evaluator" | "club_admin" => Some(Self::Evaluator),
            "student" => Some(Self::Student),
            "teacher" => Some(Self::Teacher),
            _ => None,
        }
    }
}

/// Authorization context supplied by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(id),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Lifecycle status shared by cycles and their rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Draft,
    Open,
    Closed,
    Reviewing,
    Allocating,
    Completed,
}

impl CycleStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Draft,
            Self::Open,
            Self::Closed,
            Self::Reviewing,
            Self::Allocating,
            Self::Completed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reviewing => "reviewing",
            Self::Allocating => "allocating",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Status of a single application as it moves through review and allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Allocated,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Allocated => "allocated",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One recruitment season with its own calendar and status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: CycleId,
    pub year: i32,
    pub name: String,
    pub max_applications: u32,
    pub view_start: Option<DateTime<Utc>>,
    pub apply_start: Option<DateTime<Utc>>,
    pub apply_end: Option<DateTime<Utc>>,
    pub status: CycleStatus,
}

/// Administrator input for a new cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCycle {
    pub year: i32,
    pub name: String,
    #[serde(default)]
    pub max_applications: Option<u32>,
    #[serde(default)]
    pub view_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub apply_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub apply_end: Option<DateTime<Utc>>,
}

/// Partial edit of an existing cycle. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub max_applications: Option<u32>,
    #[serde(default)]
    pub view_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub apply_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub apply_end: Option<DateTime<Utc>>,
}

/// Numbered phase of a cycle. Allocation always targets the highest number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub cycle_id: CycleId,
    pub number: u32,
    pub name: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub status: CycleStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRound {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<CycleStatus>,
}

/// Participation and capacity of one club for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundClubConfig {
    pub round_id: RoundId,
    pub club_id: ClubId,
    pub max_members: u32,
    pub is_active: bool,
}

/// Requested club slot when an administrator replaces a round's club set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubSlot {
    pub club_id: ClubId,
    pub max_members: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormQuestion {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub required: bool,
}

/// Question set an applicant answers when applying to a club in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub id: FormId,
    pub round_id: RoundId,
    pub club_id: ClubId,
    pub questions: Vec<FormQuestion>,
    pub is_active: bool,
}

/// Administrator input for a club's form. Saving again for the same club and
/// round replaces the questions and keeps the form id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewForm {
    pub round_id: RoundId,
    pub club_id: ClubId,
    #[serde(default)]
    pub questions: Vec<FormQuestion>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Free-form answer: either a single text value or a multi-select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Text(String),
    Choices(Vec<String>),
}

impl AnswerValue {
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Text(text) => text.trim().is_empty(),
            AnswerValue::Choices(choices) => choices
                .first()
                .map(|first| first.trim().is_empty())
                .unwrap_or(true),
        }
    }
}

/// One (applicant, club, round) declaration with its preference priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: UserId,
    pub club_id: ClubId,
    pub round_id: RoundId,
    pub form_id: FormId,
    pub priority: u32,
    pub status: ApplicationStatus,
    pub answers: BTreeMap<String, AnswerValue>,
    pub created_at: DateTime<Utc>,
}

/// Applicant input for a new application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitApplication {
    pub round_id: RoundId,
    pub club_id: ClubId,
    pub form_id: FormId,
    pub priority: u32,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,
}

/// Evaluator score for an application. Lower ranks are better.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantRank {
    pub application_id: ApplicationId,
    pub club_id: ClubId,
    pub rank: Option<u32>,
    pub note: String,
    pub ranked_by: UserId,
    pub updated_at: DateTime<Utc>,
}

/// Grants an evaluator authority over one club for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluatorAssignment {
    pub user_id: UserId,
    pub club_id: ClubId,
    pub cycle_id: CycleId,
}
