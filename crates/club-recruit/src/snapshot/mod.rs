//! Offline allocation snapshots exported from the portal as CSV.

mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::recruitment::allocation::{AllocationInput, Candidate};
use crate::recruitment::domain::{ApplicationId, ClubId, UserId};
use parser::{CandidateRow, CapacityRow};

#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Csv(csv::Error),
    /// Row numbers count the header as row 1.
    InvalidRow { row: usize, reason: String },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(err) => write!(f, "failed to read snapshot: {}", err),
            SnapshotError::Csv(err) => write!(f, "invalid snapshot CSV data: {}", err),
            SnapshotError::InvalidRow { row, reason } => {
                write!(f, "snapshot row {}: {}", row, reason)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(err) => Some(err),
            SnapshotError::Csv(err) => Some(err),
            SnapshotError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SnapshotError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Parse `application_id,applicant_id,club_id,priority,rank` rows. An empty
/// rank cell means the application was never ranked.
pub fn load_candidates<R: Read>(reader: R) -> Result<Vec<Candidate>, SnapshotError> {
    let rows: Vec<CandidateRow> = parser::parse_rows(reader)?;
    let mut seen = BTreeSet::new();
    let mut choices = BTreeSet::new();
    let mut priorities = BTreeSet::new();
    let mut candidates = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let line = index + 2;
        if row.priority == 0 {
            return Err(invalid(line, "priority starts at 1"));
        }
        if row.rank == Some(0) {
            return Err(invalid(line, "rank starts at 1"));
        }
        if !seen.insert(row.application_id.clone()) {
            return Err(invalid(
                line,
                format!("duplicate application id {}", row.application_id),
            ));
        }
        if !choices.insert((row.applicant_id.clone(), row.club_id.clone())) {
            return Err(invalid(
                line,
                format!("{} applied to {} twice", row.applicant_id, row.club_id),
            ));
        }
        if !priorities.insert((row.applicant_id.clone(), row.priority)) {
            return Err(invalid(
                line,
                format!("{} used priority {} twice", row.applicant_id, row.priority),
            ));
        }

        candidates.push(Candidate {
            application_id: ApplicationId::new(row.application_id),
            applicant_id: UserId::new(row.applicant_id),
            club_id: ClubId::new(row.club_id),
            priority: row.priority,
            rank: row.rank,
        });
    }

    Ok(candidates)
}

/// Parse `club_id,max_members` rows into the capacity map.
pub fn load_capacities<R: Read>(reader: R) -> Result<BTreeMap<ClubId, u32>, SnapshotError> {
    let rows: Vec<CapacityRow> = parser::parse_rows(reader)?;
    let mut capacities = BTreeMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        let club_id = ClubId::new(row.club_id);
        if capacities.contains_key(&club_id) {
            return Err(invalid(index + 2, format!("duplicate club {club_id}")));
        }
        capacities.insert(club_id, row.max_members);
    }

    Ok(capacities)
}

pub fn load_input(
    candidates: impl Read,
    capacities: impl Read,
) -> Result<AllocationInput, SnapshotError> {
    Ok(AllocationInput {
        candidates: load_candidates(candidates)?,
        capacities: load_capacities(capacities)?,
    })
}

pub fn load_input_from_paths<P, Q>(candidates: P, capacities: Q) -> Result<AllocationInput, SnapshotError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    load_input(File::open(candidates)?, File::open(capacities)?)
}

fn invalid(row: usize, reason: impl Into<String>) -> SnapshotError {
    SnapshotError::InvalidRow {
        row,
        reason: reason.into(),
    }
}
