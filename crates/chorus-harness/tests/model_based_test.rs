//! Model-based property tests.
//!
//! Random operation sequences run against a [`SimWorld`]; the provider's
//! table is the oracle for group state, and a fault-free run of the same
//! sequence is the oracle for duplicate delivery.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!     perfect world   faulty world   provider table
//!           └───────── compare ──────────┘
//! ```
#![allow(clippy::unwrap_used)]

use chorus_harness::{
    ClientId, FaultConfig, GroupId, Operation, SimProvider, SimWorld, SmallMessage,
};
use proptest::prelude::*;

const NUM_CLIENTS: usize = 3;

fn small_message_strategy() -> impl Strategy<Value = SmallMessage> {
    any::<u8>().prop_map(|seed| SmallMessage { seed })
}

/// Operations with valid client ids. Without `partial_delivery`, every
/// delivery drains all inboxes.
fn operation_strategy(partial_delivery: bool) -> impl Strategy<Value = Operation> {
    let client_id = 0..NUM_CLIENTS as ClientId;
    let group = any::<GroupId>();

    prop_oneof![
        3 => (client_id.clone(), group.clone())
            .prop_map(|(client_id, group)| Operation::CreateGroup { client_id, group }),
        1 => (client_id.clone(), group.clone())
            .prop_map(|(client_id, group)| Operation::RemoveGroup { client_id, group }),
        4 => (client_id.clone(), group.clone())
            .prop_map(|(client_id, group)| Operation::JoinGroup { client_id, group }),
        2 => (client_id.clone(), group.clone())
            .prop_map(|(client_id, group)| Operation::LeaveGroup { client_id, group }),
        1 => client_id.clone().prop_map(|client_id| Operation::Refresh { client_id }),
        4 => (client_id.clone(), group, small_message_strategy()).prop_map(
            |(client_id, group, content)| Operation::SendGroupMessage { client_id, group, content }
        ),
        2 => (client_id.clone(), client_id.clone(), small_message_strategy()).prop_map(
            |(client_id, peer, content)| Operation::SendPrivateMessage { client_id, peer, content }
        ),
        4 => (client_id.clone(), 1..8u8).prop_map(move |(client_id, count)| {
            if partial_delivery {
                Operation::Deliver { client_id, count }
            } else {
                Operation::DeliverAll
            }
        }),
        1 => any::<u16>().prop_map(|millis| Operation::AdvanceTime { millis }),
        1 => client_id.prop_map(|client_id| Operation::Shutdown { client_id }),
    ]
}

fn assert_matches_provider(world: &SimWorld) -> Result<(), TestCaseError> {
    for view in world.views().into_iter().filter(|v| !v.stopped) {
        prop_assert_eq!(&view.groups, world.provider().groups(), "{} diverged", view.identity);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_fault_free_run_matches_provider(
        seed in any::<u64>(),
        text_only in any::<bool>(),
        ops in prop::collection::vec(operation_strategy(true), 1..60)
    ) {
        let provider = if text_only { SimProvider::text_only() } else { SimProvider::new() };
        let mut world = SimWorld::with_provider(NUM_CLIENTS, seed, provider, FaultConfig::NONE);

        for op in &ops {
            world.apply(op);
            prop_assert!(world.check_invariants().is_ok(), "{:?}", world.check_invariants());
        }
        world.settle();

        prop_assert_eq!(world.decode_errors(), 0);
        assert_matches_provider(&world)?;
    }

    #[test]
    fn prop_invariants_hold_under_faults(
        seed in any::<u64>(),
        rate in 0.0..0.5f64,
        ops in prop::collection::vec(operation_strategy(true), 1..60)
    ) {
        let faults = FaultConfig::chaotic(rate);
        let mut world = SimWorld::with_provider(NUM_CLIENTS, seed, SimProvider::new(), faults);

        for op in &ops {
            world.apply(op);
            prop_assert!(world.check_invariants().is_ok(), "{:?}", world.check_invariants());
        }
        world.converge();

        prop_assert!(world.check_invariants().is_ok(), "{:?}", world.check_invariants());
        assert_matches_provider(&world)?;
    }

    #[test]
    fn prop_duplicate_delivery_changes_nothing(
        seed in any::<u64>(),
        rate in 0.1..1.0f64,
        ops in prop::collection::vec(operation_strategy(false), 1..40)
    ) {
        let mut perfect = SimWorld::new(NUM_CLIENTS, seed);
        let duplicating = FaultConfig::duplicating(rate);
        let mut faulty =
            SimWorld::with_provider(NUM_CLIENTS, seed, SimProvider::new(), duplicating);

        for op in &ops {
            let expected = perfect.apply(op);
            let actual = faulty.apply(op);
            prop_assert_eq!(&actual, &expected, "{:?}", op);
            perfect.settle();
            faulty.settle();
        }

        prop_assert_eq!(faulty.views(), perfect.views());
    }

    #[test]
    fn prop_create_twice_is_refused(
        client_id in 0..NUM_CLIENTS as ClientId,
        group in any::<GroupId>()
    ) {
        let mut world = SimWorld::new(NUM_CLIENTS, 0);

        let first = world.apply(&Operation::CreateGroup { client_id, group });
        world.settle();
        let second = world.apply(&Operation::CreateGroup { client_id, group });

        prop_assert!(first.is_ok());
        prop_assert!(!second.is_ok());
    }

    #[test]
    fn prop_send_requires_join(
        client_id in 0..NUM_CLIENTS as ClientId,
        group in any::<GroupId>(),
        content in small_message_strategy()
    ) {
        let mut world = SimWorld::new(NUM_CLIENTS, 1);
        world.apply(&Operation::CreateGroup { client_id, group });
        world.settle();

        let result = world.apply(&Operation::SendGroupMessage { client_id, group, content });

        prop_assert!(!result.is_ok());
        // The create plus one refresh per client; the refused send never left.
        prop_assert_eq!(world.provider().handled(), 1 + NUM_CLIENTS as u64);
    }
}
