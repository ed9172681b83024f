use std::collections::BTreeMap;

use super::Candidate;
use crate::recruitment::domain::{ClubId, UserId};

/// Arena of candidates plus the applicant and club indexes built over it.
/// Applicants are numbered in ascending id order so every pass visits them in
/// the same sequence.
pub(super) struct CandidateIndex<'a> {
    candidates: &'a [Candidate],
    choices: Vec<Vec<usize>>,
    applicant_of: Vec<usize>,
    clubs: BTreeMap<&'a ClubId, Vec<usize>>,
    standing: Vec<usize>,
}

impl<'a> CandidateIndex<'a> {
    pub(super) fn build(candidates: &'a [Candidate]) -> Self {
        let mut by_applicant: BTreeMap<&'a UserId, Vec<usize>> = BTreeMap::new();
        let mut clubs: BTreeMap<&'a ClubId, Vec<usize>> = BTreeMap::new();

        for (slot, candidate) in candidates.iter().enumerate() {
            by_applicant
                .entry(&candidate.applicant_id)
                .or_default()
                .push(slot);
            clubs.entry(&candidate.club_id).or_default().push(slot);
        }

        let mut applicant_of = vec![0; candidates.len()];
        let mut choices = Vec::with_capacity(by_applicant.len());
        for (applicant, (_, mut slots)) in by_applicant.into_iter().enumerate() {
            slots.sort_by(|&a, &b| {
                let (a, b) = (&candidates[a], &candidates[b]);
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| a.application_id.cmp(&b.application_id))
            });
            for &slot in &slots {
                applicant_of[slot] = applicant;
            }
            choices.push(slots);
        }

        let mut standing = vec![0; candidates.len()];
        for slots in clubs.values_mut() {
            slots.sort_by_key(|&slot| evaluation_key(&candidates[slot]));
            for (position, &slot) in slots.iter().enumerate() {
                standing[slot] = position;
            }
        }

        Self {
            candidates,
            choices,
            applicant_of,
            clubs,
            standing,
        }
    }

    pub(super) fn len(&self) -> usize {
        self.candidates.len()
    }

    pub(super) fn applicant_count(&self) -> usize {
        self.choices.len()
    }

    /// Applications of one applicant, most preferred first.
    pub(super) fn choices(&self, applicant: usize) -> &[usize] {
        &self.choices[applicant]
    }

    pub(super) fn applicant_of(&self, slot: usize) -> usize {
        self.applicant_of[slot]
    }

    pub(super) fn club_of(&self, slot: usize) -> &'a ClubId {
        &self.candidates[slot].club_id
    }

    /// Applications to one club, best evaluated first.
    pub(super) fn club_order(&self, club: &ClubId) -> &[usize] {
        self.clubs.get(club).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of the application inside its club's evaluation order.
    pub(super) fn standing(&self, slot: usize) -> usize {
        self.standing[slot]
    }
}

/// Rank ascending with unranked candidates after every ranked one, then the
/// applicant's declared priority, then the application id.
fn evaluation_key(candidate: &Candidate) -> (bool, Option<u32>, u32, &str) {
    (
        candidate.rank.is_none(),
        candidate.rank,
        candidate.priority,
        candidate.application_id.as_str(),
    )
}
