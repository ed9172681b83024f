//! Recruitment lifecycle: legal status transitions and the permission gates
//! derived from a cycle's status and calendar window.

use chrono::{DateTime, Utc};

use super::domain::{Cycle, CycleStatus};

/// Raised when an operation is attempted in the wrong lifecycle phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleViolation {
    #[error("cannot move cycle from {from} to {to}")]
    IllegalTransition { from: CycleStatus, to: CycleStatus },
    #[error("cycle is completed and read-only")]
    CycleCompleted,
    #[error("round already has allocated applications; results are final")]
    RoundAllocated,
    #[error("another cycle is already in progress")]
    ActiveCycleExists,
    #[error("application window is not configured")]
    ApplyWindowNotConfigured,
    #[error("application window opens at {opens_at}")]
    ApplyWindowNotOpen { opens_at: DateTime<Utc> },
    #[error("application window closed at {closed_at}")]
    ApplyWindowClosed { closed_at: DateTime<Utc> },
    #[error("applications can no longer be cancelled after {closed_at}")]
    CancellationClosed { closed_at: DateTime<Utc> },
    #[error("evaluation opens when the application window closes at {opens_at}")]
    EvaluationNotStarted { opens_at: DateTime<Utc> },
    #[error("allocation requires a reviewing or allocating cycle (found {0})")]
    AllocationNotPermitted(CycleStatus),
    #[error("form is not accepting applications")]
    FormInactive,
}

impl CycleStatus {
    /// Terminal cycles accept no further writes.
    pub const fn is_terminal(self) -> bool {
        matches!(self, CycleStatus::Completed)
    }

    /// Anything between draft and completed counts toward the single
    /// in-progress cycle allowance.
    pub const fn is_in_progress(self) -> bool {
        !matches!(self, CycleStatus::Draft | CycleStatus::Completed)
    }

    /// Administrator-driven moves. The chain only advances, except that the
    /// open/closed boundary may be crossed in either direction. Completion has
    /// its own operation and is never reached through a plain transition.
    pub fn can_transition_to(self, next: CycleStatus) -> bool {
        use CycleStatus::*;

        if self == next || self.is_terminal() || next == Completed || next == Draft {
            return false;
        }

        match (self, next) {
            (Closed, Open) => true,
            _ => next > self,
        }
    }
}

pub fn check_transition(from: CycleStatus, to: CycleStatus) -> Result<(), LifecycleViolation> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleViolation::IllegalTransition { from, to })
    }
}

/// Status a reader should act on. An open cycle past its apply-end instant
/// behaves as closed even if nobody advanced the stored status.
pub fn effective_status(cycle: &Cycle, now: DateTime<Utc>) -> CycleStatus {
    match (cycle.status, cycle.apply_end) {
        (CycleStatus::Open, Some(end)) if now > end => CycleStatus::Closed,
        (status, _) => status,
    }
}

/// Submission is gated purely on the calendar window, not the stored status.
pub fn submission_window(cycle: &Cycle, now: DateTime<Utc>) -> Result<(), LifecycleViolation> {
    let (start, end) = match (cycle.apply_start, cycle.apply_end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(LifecycleViolation::ApplyWindowNotConfigured),
    };

    if now < start {
        return Err(LifecycleViolation::ApplyWindowNotOpen { opens_at: start });
    }
    if now > end {
        return Err(LifecycleViolation::ApplyWindowClosed { closed_at: end });
    }

    Ok(())
}

pub fn cancellation_window(cycle: &Cycle, now: DateTime<Utc>) -> Result<(), LifecycleViolation> {
    match cycle.apply_end {
        Some(end) if now > end => Err(LifecycleViolation::CancellationClosed { closed_at: end }),
        _ => Ok(()),
    }
}

/// Conditions shared by rank edits and status changes: the cycle is not
/// completed and the round has not been allocated.
pub fn ranking_gate(cycle: &Cycle, round_allocated: bool) -> Result<(), LifecycleViolation> {
    if cycle.status.is_terminal() {
        return Err(LifecycleViolation::CycleCompleted);
    }
    if round_allocated {
        return Err(LifecycleViolation::RoundAllocated);
    }
    Ok(())
}

/// Status changes additionally wait for the application window to close so
/// decisions cannot leak while applicants are still applying.
pub fn evaluation_gate(
    cycle: &Cycle,
    round_allocated: bool,
    now: DateTime<Utc>,
) -> Result<(), LifecycleViolation> {
    ranking_gate(cycle, round_allocated)?;

    match cycle.apply_end {
        None => Err(LifecycleViolation::ApplyWindowNotConfigured),
        Some(end) if now < end => Err(LifecycleViolation::EvaluationNotStarted { opens_at: end }),
        Some(_) => Ok(()),
    }
}

pub fn allocation_gate(cycle: &Cycle) -> Result<(), LifecycleViolation> {
    match cycle.status {
        CycleStatus::Reviewing | CycleStatus::Allocating => Ok(()),
        CycleStatus::Completed => Err(LifecycleViolation::CycleCompleted),
        other => Err(LifecycleViolation::AllocationNotPermitted(other)),
    }
}

pub fn completion_gate(cycle: &Cycle) -> Result<(), LifecycleViolation> {
    if cycle.status.is_terminal() {
        Err(LifecycleViolation::CycleCompleted)
    } else {
        Ok(())
    }
}
