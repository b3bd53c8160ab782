//! Property tests over random event sequences.


use std::collections::BTreeSet;

use harness::Harness;
use proptest::prelude::*;
use skiff_events::{Offer, TaskState};

#[derive(Debug, Clone)]
enum Step {
    Offers(Vec<(u8, bool)>),
    Status(u8, TaskState),
}

fn task_state() -> impl Strategy<Value = TaskState> {
    prop_oneof![
        4 => Just(TaskState::Running),
        1 => Just(TaskState::Staging),
        1 => Just(TaskState::Failed),
        1 => Just(TaskState::Finished),
        1 => Just(TaskState::Lost),
        1 => Just(TaskState::Killed),
        1 => Just(TaskState::Other("TASK_UNREACHABLE".to_string())),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => prop::collection::vec((any::<u8>(), any::<bool>()), 0..5).prop_map(Step::Offers),
        2 => (1u8..10, task_state()).prop_map(|(n, s)| Step::Status(n, s)),
    ]
}

fn make_offer(seq: usize, (n, in_zone): (u8, bool)) -> Offer {
    let zone = if in_zone { "a" } else { "b" };
    Offer::new(format!("offer-{seq}"), format!("agent-{n}"), &format!("node-{n}"))
        .with_text_attribute("zone", zone)
}

proptest! {
    #[test]
    fn invariants_hold_for_any_event_sequence(
        desired in 1u32..5,
        steps in prop::collection::vec(step(), 0..40),
    ) {
        let mut h = Harness::with_constraints(desired, "zone:CLUSTER:a");
        let mut offers_seen = 0usize;

        for step in steps {
            match step {
                Step::Offers(specs) => {
                    let batch: Vec<Offer> = specs
                        .into_iter()
                        .enumerate()
                        .map(|(i, s)| make_offer(offers_seen + i, s))
                        .collect();
                    offers_seen += batch.len();
                    h.offers(batch);
                }
                Step::Status(n, state) => h.status(&format!("t-{n}"), state),
            }

            let state = h.scheduler.state();
            prop_assert!(state.active_count() <= desired as usize);
            prop_assert_eq!(h.driver.response_count(), offers_seen);
            prop_assert!(h.driver.shutdown_count() <= 1);
            prop_assert_eq!(h.driver.shutdown_count() == 1, h.scheduler.is_complete());

            let pending: BTreeSet<String> = h.pending().into_iter().collect();
            let running: BTreeSet<String> = h.running().into_iter().collect();
            prop_assert!(pending.is_disjoint(&running));
        }
    }

    #[test]
    fn launches_never_exceed_target_before_completion(
        desired in 1u32..6,
        batch_sizes in prop::collection::vec(0usize..8, 1..6),
    ) {
        let mut h = Harness::new(desired);
        let mut seq = 0usize;

        for size in batch_sizes {
            let batch: Vec<Offer> = (0..size)
                .map(|i| make_offer(seq + i, (i as u8, true)))
                .collect();
            seq += size;
            h.offers(batch);
        }

        let launched = h.driver.launches().len();
        prop_assert_eq!(launched, seq.min(desired as usize));
        prop_assert_eq!(h.driver.decline_count(), seq - launched);
        prop_assert_eq!(h.ids.issued() as usize, launched);
    }
}
