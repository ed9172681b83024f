use std::collections::BTreeMap;

use tracing::trace;

use super::index::CandidateIndex;
use crate::recruitment::domain::ClubId;

pub(super) struct Outcome {
    /// Indexed by arena slot.
    pub(super) seated: Vec<bool>,
    pub(super) passes: usize,
}

/// Every unsettled applicant walks their list from where they stopped and
/// proposes until some club holds them. A club holds its best `capacity`
/// proposals; the worst one is released when a better proposal arrives and
/// its applicant re-enters the next pass. Each application is proposed at
/// most once, so the loop reaches a pass without proposals.
pub(super) fn deferred_acceptance(
    index: &CandidateIndex<'_>,
    capacities: &BTreeMap<ClubId, u32>,
) -> Outcome {
    let applicants = index.applicant_count();
    let mut cursor = vec![0usize; applicants];
    let mut seat: Vec<Option<usize>> = vec![None; applicants];
    let mut held: BTreeMap<&ClubId, Vec<usize>> = BTreeMap::new();
    let mut passes = 0;

    loop {
        passes += 1;
        let mut proposals = 0usize;

        for applicant in 0..applicants {
            let choices = index.choices(applicant);
            while seat[applicant].is_none() && cursor[applicant] < choices.len() {
                let slot = choices[cursor[applicant]];
                cursor[applicant] += 1;
                proposals += 1;

                let club = index.club_of(slot);
                let capacity = capacities.get(club).copied().unwrap_or(0) as usize;
                if capacity == 0 {
                    continue;
                }

                let seats = held.entry(club).or_default();
                let position =
                    seats.partition_point(|&other| index.standing(other) < index.standing(slot));
                seats.insert(position, slot);
                seat[applicant] = Some(slot);

                if seats.len() > capacity {
                    if let Some(released) = seats.pop() {
                        seat[index.applicant_of(released)] = None;
                    }
                }
            }
        }

        trace!(passes, proposals, "deferred acceptance pass");
        if proposals == 0 {
            break;
        }
    }

    Outcome {
        seated: seated_slots(index.len(), seat),
        passes,
    }
}

/// Settlement is permanent. In each pass an unsettled applicant takes the
/// first club where their application falls inside the club's window: the
/// first `capacity - seated` entries of the club's order, skipping applicants
/// already settled elsewhere. Repeats until a pass settles nobody.
pub(super) fn settled_window(
    index: &CandidateIndex<'_>,
    capacities: &BTreeMap<ClubId, u32>,
) -> Outcome {
    let applicants = index.applicant_count();
    let mut seat: Vec<Option<usize>> = vec![None; applicants];
    let mut seated_per_club: BTreeMap<&ClubId, usize> = BTreeMap::new();
    let mut passes = 0;

    loop {
        passes += 1;
        let mut settled_this_pass = 0usize;

        for applicant in 0..applicants {
            if seat[applicant].is_some() {
                continue;
            }

            for &slot in index.choices(applicant) {
                let club = index.club_of(slot);
                let Some(&capacity) = capacities.get(club) else {
                    continue;
                };
                let current = seated_per_club.get(club).copied().unwrap_or(0);
                let open = (capacity as usize).saturating_sub(current);
                if open == 0 {
                    continue;
                }

                let within_window = index
                    .club_order(club)
                    .iter()
                    .filter(|&&other| {
                        let owner = index.applicant_of(other);
                        owner == applicant || seat[owner].is_none()
                    })
                    .take(open)
                    .any(|&other| other == slot);

                if within_window {
                    seat[applicant] = Some(slot);
                    *seated_per_club.entry(club).or_insert(0) += 1;
                    settled_this_pass += 1;
                    break;
                }
            }
        }

        trace!(passes, settled_this_pass, "settled window pass");
        if settled_this_pass == 0 {
            break;
        }
    }

    Outcome {
        seated: seated_slots(index.len(), seat),
        passes,
    }
}

fn seated_slots(len: usize, seats: Vec<Option<usize>>) -> Vec<bool> {
    let mut seated = vec![false; len];
    for slot in seats.into_iter().flatten() {
        seated[slot] = true;
    }
    seated
}
