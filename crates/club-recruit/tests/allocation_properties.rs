use std::collections::{BTreeMap, BTreeSet};

use club_recruit::recruitment::{
    AllocationEngine, AllocationInput, AllocationPlan, AllocationStrategy, ApplicationId,
    Candidate, ClubId, UserId,
};
use proptest::prelude::*;

const CLUBS: [&str; 4] = ["art", "band", "chess", "drama"];

fn arb_capacities() -> impl Strategy<Value = BTreeMap<ClubId, u32>> {
    proptest::collection::vec(proptest::option::of(0..3u32), CLUBS.len()).prop_map(|caps| {
        CLUBS
            .iter()
            .zip(caps)
            .filter_map(|(club, cap)| cap.map(|cap| (ClubId::new(*club), cap)))
            .collect()
    })
}

/// Each applicant lists distinct clubs; list position becomes the priority.
fn arb_candidates() -> impl Strategy<Value = Vec<Candidate>> {
    let choices = proptest::collection::vec(
        (0..CLUBS.len(), proptest::option::of(1..5u32)),
        0..=CLUBS.len(),
    );
    proptest::collection::vec(choices, 0..8).prop_map(|applicants| {
        let mut candidates = Vec::new();
        for (applicant, choices) in applicants.into_iter().enumerate() {
            let mut seen = BTreeSet::new();
            for (club, rank) in choices {
                if !seen.insert(club) {
                    continue;
                }
                candidates.push(Candidate {
                    application_id: ApplicationId::new(format!("app-{applicant}-{club}")),
                    applicant_id: UserId::new(format!("user-{applicant}")),
                    club_id: ClubId::new(CLUBS[club]),
                    priority: seen.len() as u32,
                    rank,
                });
            }
        }
        candidates
    })
}

fn arb_input() -> impl Strategy<Value = AllocationInput> {
    (arb_candidates(), arb_capacities())
        .prop_map(|(candidates, capacities)| AllocationInput {
            candidates,
            capacities,
        })
}

fn arb_strategy() -> impl Strategy<Value = AllocationStrategy> {
    prop_oneof![
        Just(AllocationStrategy::DeferredAcceptance),
        Just(AllocationStrategy::SettledWindow),
    ]
}

fn evaluation_key(candidate: &Candidate) -> (bool, Option<u32>, u32, &str) {
    (
        candidate.rank.is_none(),
        candidate.rank,
        candidate.priority,
        candidate.application_id.as_str(),
    )
}

fn seated<'a>(input: &'a AllocationInput, plan: &AllocationPlan) -> Vec<&'a Candidate> {
    let allocated: BTreeSet<&ApplicationId> = plan
        .allocated
        .iter()
        .map(|assignment| &assignment.application_id)
        .collect();
    input
        .candidates
        .iter()
        .filter(|candidate| allocated.contains(&candidate.application_id))
        .collect()
}

proptest! {
    #[test]
    fn seats_never_exceed_capacity(input in arb_input(), strategy in arb_strategy()) {
        let plan = AllocationEngine::new(strategy).run(&input);

        for (club, seats) in plan.seats_by_club() {
            let capacity = input.capacities.get(&club).copied().unwrap_or(0);
            prop_assert!(seats as u32 <= capacity, "{club} holds {seats} of {capacity}");
        }
    }

    #[test]
    fn applicants_hold_at_most_one_seat(input in arb_input(), strategy in arb_strategy()) {
        let plan = AllocationEngine::new(strategy).run(&input);

        let mut applicants = BTreeSet::new();
        for assignment in &plan.allocated {
            prop_assert!(
                applicants.insert(assignment.applicant_id.clone()),
                "{} seated twice",
                assignment.applicant_id
            );
        }
    }

    #[test]
    fn every_candidate_lands_in_exactly_one_half(input in arb_input(), strategy in arb_strategy()) {
        let plan = AllocationEngine::new(strategy).run(&input);

        let allocated: BTreeSet<ApplicationId> = plan
            .allocated
            .iter()
            .map(|assignment| assignment.application_id.clone())
            .collect();
        let rejected: BTreeSet<ApplicationId> = plan.rejected.iter().cloned().collect();
        let all: BTreeSet<ApplicationId> = input
            .candidates
            .iter()
            .map(|candidate| candidate.application_id.clone())
            .collect();

        prop_assert!(allocated.is_disjoint(&rejected));
        prop_assert_eq!(allocated.len() + rejected.len(), input.candidates.len());
        prop_assert_eq!(allocated.union(&rejected).cloned().collect::<BTreeSet<_>>(), all);
    }

    #[test]
    fn runs_are_deterministic_and_ignore_input_order(
        input in arb_input(),
        strategy in arb_strategy(),
    ) {
        let engine = AllocationEngine::new(strategy);
        let first = engine.run(&input);
        prop_assert_eq!(&first, &engine.run(&input));

        let mut reversed = input.clone();
        reversed.candidates.reverse();
        let other = engine.run(&reversed);
        prop_assert_eq!(first.allocated, other.allocated);
        prop_assert_eq!(first.rejected, other.rejected);
    }

    #[test]
    fn closed_clubs_receive_nobody(input in arb_input(), strategy in arb_strategy()) {
        let plan = AllocationEngine::new(strategy).run(&input);

        for assignment in &plan.allocated {
            let capacity = input.capacities.get(&assignment.club_id).copied().unwrap_or(0);
            prop_assert!(capacity > 0, "{} seated at closed club", assignment.applicant_id);
        }
    }

    #[test]
    fn no_seat_stays_idle_while_a_wanting_applicant_waits(
        input in arb_input(),
        strategy in arb_strategy(),
    ) {
        let plan = AllocationEngine::new(strategy).run(&input);
        let seats = plan.seats_by_club();
        let seated_applicants: BTreeSet<&UserId> = plan
            .allocated
            .iter()
            .map(|assignment| &assignment.applicant_id)
            .collect();

        for candidate in &input.candidates {
            if seated_applicants.contains(&candidate.applicant_id) {
                continue;
            }
            let capacity = input.capacities.get(&candidate.club_id).copied().unwrap_or(0) as usize;
            let taken = seats.get(&candidate.club_id).copied().unwrap_or(0);
            prop_assert!(
                taken >= capacity,
                "{} left out while {} has {} of {} seats taken",
                candidate.applicant_id,
                candidate.club_id,
                taken,
                capacity
            );
        }
    }

    #[test]
    fn deferred_acceptance_leaves_no_blocking_pair(input in arb_input()) {
        let plan = AllocationEngine::new(AllocationStrategy::DeferredAcceptance).run(&input);
        let held = seated(&input, &plan);
        let seat_of: BTreeMap<&UserId, &Candidate> = held
            .iter()
            .map(|candidate| (&candidate.applicant_id, *candidate))
            .collect();

        for candidate in &input.candidates {
            let prefers = match seat_of.get(&candidate.applicant_id) {
                Some(current) => candidate.priority < current.priority,
                None => true,
            };
            if !prefers {
                continue;
            }

            let capacity = input.capacities.get(&candidate.club_id).copied().unwrap_or(0) as usize;
            let holders: Vec<&&Candidate> = held
                .iter()
                .filter(|other| other.club_id == candidate.club_id)
                .collect();
            prop_assert_eq!(holders.len(), capacity);
            for holder in holders {
                prop_assert!(
                    evaluation_key(holder) < evaluation_key(candidate),
                    "{} outranks seated {} at {}",
                    candidate.application_id,
                    holder.application_id,
                    candidate.club_id
                );
            }
        }
    }
}

#[test]
fn zero_capacity_rejects_the_only_candidate() {
    let input = AllocationInput {
        candidates: vec![Candidate {
            application_id: ApplicationId::new("solo"),
            applicant_id: UserId::new("s"),
            club_id: ClubId::new("art"),
            priority: 1,
            rank: Some(1),
        }],
        capacities: [(ClubId::new("art"), 0)].into_iter().collect(),
    };

    let plan = AllocationEngine::default().run(&input);
    assert_eq!(plan.allocated_count(), 0);
    assert_eq!(plan.rejected, vec![ApplicationId::new("solo")]);
}
