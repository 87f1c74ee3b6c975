//! Property-based tests for CopyOnWriteSet laws.
//!
//! These tests check that the set behaves like a mathematical set under any
//! sequence of operations, and that escaped views never change.

use cowset::concurrent::{ByIdentity, CopyOnWriteSet};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Operation {
    Add(u8),
    Remove(u8),
    Snapshot,
    Iterate,
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => any::<u8>().prop_map(Operation::Add),
        3 => any::<u8>().prop_map(Operation::Remove),
        1 => Just(Operation::Snapshot),
        1 => Just(Operation::Iterate),
    ]
}

fn sorted(mut elements: Vec<u8>) -> Vec<u8> {
    elements.sort_unstable();
    elements
}

// =============================================================================
// Model Law
// Description: The set agrees with a HashSet model after every operation
// =============================================================================

proptest! {
    #[test]
    fn prop_matches_hash_set_model(
        operations in prop::collection::vec(operation_strategy(), 0..100)
    ) {
        let set: CopyOnWriteSet<u8> = CopyOnWriteSet::new();
        let mut model: HashSet<u8> = HashSet::new();

        for operation in operations {
            match operation {
                Operation::Add(element) => {
                    set.add(element).unwrap();
                    model.insert(element);
                }
                Operation::Remove(element) => {
                    prop_assert_eq!(set.remove(&element).unwrap(), model.remove(&element));
                }
                Operation::Snapshot => {
                    let _ = set.snapshot();
                }
                Operation::Iterate => {
                    let _ = set.iter();
                }
            }
            prop_assert_eq!(set.len(), model.len());
        }

        for element in 0..=u8::MAX {
            prop_assert_eq!(set.contains(&element), model.contains(&element));
        }
    }
}

// =============================================================================
// Frozen Snapshot Law
// Description: A snapshot keeps the contents it had when it was taken,
// whatever happens to the set afterwards
// =============================================================================

proptest! {
    #[test]
    fn prop_snapshot_is_frozen(
        initial in prop::collection::vec(any::<u8>(), 0..50),
        operations in prop::collection::vec(operation_strategy(), 0..50)
    ) {
        let set: CopyOnWriteSet<u8> = initial.into_iter().collect();
        let snapshot = set.snapshot();
        let expected = sorted(snapshot.to_vec());

        for operation in operations {
            match operation {
                Operation::Add(element) => set.add(element).unwrap(),
                Operation::Remove(element) => {
                    set.remove(&element).unwrap();
                }
                Operation::Snapshot => {
                    let _ = set.snapshot();
                }
                Operation::Iterate => {
                    let _ = set.iter();
                }
            }
        }

        prop_assert_eq!(sorted(snapshot.to_vec()), expected);
    }
}

// =============================================================================
// Frozen Iterator Law
// Description: An iterator yields exactly the elements present when it was
// obtained
// =============================================================================

proptest! {
    #[test]
    fn prop_iterator_is_frozen(
        initial in prop::collection::vec(any::<u8>(), 0..50),
        additions in prop::collection::vec(any::<u8>(), 0..20),
        removals in prop::collection::vec(any::<u8>(), 0..20)
    ) {
        let set: CopyOnWriteSet<u8> = initial.iter().copied().collect();
        let expected: HashSet<u8> = initial.into_iter().collect();

        let iterator = set.iter();
        set.add_all(additions).unwrap();
        for element in &removals {
            set.remove(element).unwrap();
        }

        let yielded: Vec<u8> = iterator.collect();
        prop_assert_eq!(yielded.len(), expected.len());
        prop_assert_eq!(yielded.into_iter().collect::<HashSet<_>>(), expected);
    }
}

// =============================================================================
// Idempotent Add Law
// Description: add(x); add(x) has the same effect as add(x)
// =============================================================================

proptest! {
    #[test]
    fn prop_add_is_idempotent(
        elements in prop::collection::vec(any::<i32>(), 0..50),
        element: i32
    ) {
        let once: CopyOnWriteSet<i32> = elements.iter().copied().collect();
        let twice: CopyOnWriteSet<i32> = elements.into_iter().collect();

        once.add(element).unwrap();
        twice.add(element).unwrap();
        twice.add(element).unwrap();

        prop_assert_eq!(once.len(), twice.len());
        prop_assert!(twice.contains(&element));
    }
}

// =============================================================================
// Size Law
// Description: len equals the number of elements a fresh iterator yields
// =============================================================================

proptest! {
    #[test]
    fn prop_len_matches_iterator_count(
        operations in prop::collection::vec(operation_strategy(), 0..100)
    ) {
        let set: CopyOnWriteSet<u8> = CopyOnWriteSet::new();
        for operation in operations {
            match operation {
                Operation::Add(element) => set.add(element).unwrap(),
                Operation::Remove(element) => {
                    set.remove(&element).unwrap();
                }
                Operation::Snapshot | Operation::Iterate => {}
            }
            let length = set.len();
            prop_assert_eq!(set.iter().count(), length);
        }
    }
}

// =============================================================================
// Remove-Contains Law
// Description: A removed element is not contained afterwards, and an added
// element is
// =============================================================================

proptest! {
    #[test]
    fn prop_add_then_remove(
        elements in prop::collection::vec(any::<i32>(), 0..50),
        element: i32
    ) {
        let set: CopyOnWriteSet<i32> = elements.into_iter().collect();

        set.add(element).unwrap();
        prop_assert!(set.contains(&element));

        prop_assert!(set.remove(&element).unwrap());
        prop_assert!(!set.contains(&element));
    }
}

// =============================================================================
// Identity Law
// Description: Identity membership keeps every allocation, value membership
// keeps every distinct value
// =============================================================================

proptest! {
    #[test]
    fn prop_identity_counts_allocations(
        values in prop::collection::vec(0u8..4, 0..30)
    ) {
        let by_identity: CopyOnWriteSet<Arc<u8>, ByIdentity> = CopyOnWriteSet::new();
        let by_value: CopyOnWriteSet<Arc<u8>> = CopyOnWriteSet::new();

        for value in &values {
            let allocation = Arc::new(*value);
            by_identity.add(Arc::clone(&allocation)).unwrap();
            by_value.add(allocation).unwrap();
        }

        let distinct: HashSet<u8> = values.iter().copied().collect();
        prop_assert_eq!(by_identity.len(), values.len());
        prop_assert_eq!(by_value.len(), distinct.len());
    }
}
