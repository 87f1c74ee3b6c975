//! The backing collection of a [`CopyOnWriteSet`](super::CopyOnWriteSet).
//!
//! An element table keeps its members in a dense `Vec` and indexes them by
//! membership hash. Dense storage gives positional access, which lets an
//! iterator walk a shared table lazily without borrowing it.
//!
//! # Time Complexity
//!
//! | Operation    | Complexity         |
//! |--------------|--------------------|
//! | `contains`   | O(1) expected      |
//! | `try_insert` | O(1) amortized     |
//! | `remove`     | O(1) expected      |
//! | `try_clone`  | O(n)               |
//! | `get`        | O(1)               |

use std::collections::{HashMap, TryReserveError};
use std::hash::{BuildHasher, Hasher};
use std::marker::PhantomData;

use smallvec::SmallVec;

use super::IndexBuildHasher;
use super::membership::Membership;

/// Positions of the elements sharing one membership hash.
type Positions = SmallVec<[usize; 1]>;

/// A failed reservation, with the number of elements it was made for.
#[derive(Debug)]
pub(crate) struct ReserveFailure {
    pub(crate) requested: usize,
    pub(crate) source: TryReserveError,
}

impl ReserveFailure {
    const fn new(requested: usize, source: TryReserveError) -> Self {
        Self { requested, source }
    }
}

/// Dense element storage with a membership index.
///
/// Invariants:
/// - every position in `index` is a valid index into `elements`
/// - every element appears under exactly one position, keyed by its
///   membership hash
/// - no two elements are the same member according to `M`
pub(crate) struct ElementTable<T, M> {
    elements: Vec<T>,
    index: HashMap<u64, Positions, IndexBuildHasher>,
    hasher: IndexBuildHasher,
    membership: PhantomData<fn() -> M>,
}

impl<T, M> ElementTable<T, M> {
    pub(crate) fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::with_hasher(IndexBuildHasher::default()),
            hasher: IndexBuildHasher::default(),
            membership: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[inline]
    pub(crate) fn as_slice(&self) -> &[T] {
        &self.elements
    }

    #[inline]
    pub(crate) fn get(&self, position: usize) -> Option<&T> {
        self.elements.get(position)
    }

    pub(crate) fn clear(&mut self) {
        self.elements.clear();
        self.index.clear();
    }
}

impl<T, M: Membership<T>> ElementTable<T, M> {
    fn hash_of(&self, element: &T) -> u64 {
        let mut state = self.hasher.build_hasher();
        M::hash(element, &mut state);
        state.finish()
    }

    fn position_in(&self, hash: u64, element: &T) -> Option<usize> {
        self.index
            .get(&hash)?
            .iter()
            .copied()
            .find(|&position| M::same(&self.elements[position], element))
    }

    pub(crate) fn contains(&self, element: &T) -> bool {
        self.position_in(self.hash_of(element), element).is_some()
    }

    /// Reserves room for `additional` new members.
    ///
    /// Inserts that follow a successful reservation do not grow the table.
    pub(crate) fn try_reserve(&mut self, additional: usize) -> Result<(), ReserveFailure> {
        self.elements
            .try_reserve(additional)
            .and_then(|()| self.index.try_reserve(additional))
            .map_err(|source| ReserveFailure::new(additional, source))
    }

    /// Inserts `element` unless an equivalent member is present.
    ///
    /// Returns `Ok(true)` if the element was inserted. On error the table is
    /// unchanged.
    pub(crate) fn try_insert(&mut self, element: T) -> Result<bool, ReserveFailure> {
        let hash = self.hash_of(&element);
        if self.position_in(hash, &element).is_some() {
            return Ok(false);
        }
        self.try_reserve(1)?;
        self.push_new(hash, element);
        Ok(true)
    }

    /// Inserts `element` unless an equivalent member is present, growing the
    /// table with the global allocator's usual failure behaviour.
    pub(crate) fn insert(&mut self, element: T) -> bool {
        let hash = self.hash_of(&element);
        if self.position_in(hash, &element).is_some() {
            return false;
        }
        self.push_new(hash, element);
        true
    }

    fn push_new(&mut self, hash: u64, element: T) {
        let position = self.elements.len();
        self.elements.push(element);
        self.index.entry(hash).or_default().push(position);
    }

    /// Removes the member equivalent to `element`.
    ///
    /// The last element is moved into the vacated position, so positions of
    /// other elements are not stable across removals.
    pub(crate) fn remove(&mut self, element: &T) -> bool {
        let hash = self.hash_of(element);
        let Some(bucket) = self.index.get_mut(&hash) else {
            return false;
        };
        let Some(slot) = bucket
            .iter()
            .position(|&position| M::same(&self.elements[position], element))
        else {
            return false;
        };

        let position = bucket.swap_remove(slot);
        if bucket.is_empty() {
            self.index.remove(&hash);
        }

        let last = self.elements.len() - 1;
        self.elements.swap_remove(position);

        if position != last {
            let moved_hash = self.hash_of(&self.elements[position]);
            if let Some(moved) = self
                .index
                .get_mut(&moved_hash)
                .and_then(|bucket| bucket.iter_mut().find(|candidate| **candidate == last))
            {
                *moved = position;
            }
        }
        true
    }
}

impl<T: Clone, M> ElementTable<T, M> {
    /// Copies the table, reserving all memory before cloning anything.
    ///
    /// The copy hashes with the same keys as `self`, so the index carries over
    /// unchanged.
    pub(crate) fn try_clone(&self) -> Result<Self, ReserveFailure> {
        let requested = self.elements.len();

        let mut elements = Vec::new();
        elements
            .try_reserve_exact(requested)
            .map_err(|source| ReserveFailure::new(requested, source))?;

        let mut index = HashMap::with_hasher(self.hasher.clone());
        index
            .try_reserve(self.index.len())
            .map_err(|source| ReserveFailure::new(requested, source))?;

        elements.extend_from_slice(&self.elements);
        index.extend(
            self.index
                .iter()
                .map(|(hash, positions)| (*hash, positions.clone())),
        );

        Ok(Self {
            elements,
            index,
            hasher: self.hasher.clone(),
            membership: PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrent::{ByIdentity, ByValue};
    use rstest::rstest;
    use std::sync::Arc;

    /// Sends every element to the same bucket.
    struct Colliding;

    impl Membership<i32> for Colliding {
        const IDENTITY: bool = false;

        fn hash<H: Hasher>(_element: &i32, state: &mut H) {
            state.write_u8(0);
        }

        fn same(left: &i32, right: &i32) -> bool {
            left == right
        }
    }

    fn assert_index_consistent<T, M: Membership<T>>(table: &ElementTable<T, M>) {
        let indexed: usize = table.index.values().map(|positions| positions.len()).sum();
        assert_eq!(indexed, table.len());
        for element in table.as_slice() {
            assert!(table.contains(element));
        }
    }

    #[rstest]
    fn test_new_table_is_empty() {
        let table: ElementTable<i32, ByValue> = ElementTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(!table.contains(&1));
    }

    #[rstest]
    fn test_try_insert_reports_duplicates() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        assert!(table.try_insert(1).unwrap());
        assert!(!table.try_insert(1).unwrap());
        assert_eq!(table.len(), 1);
    }

    #[rstest]
    fn test_insert_matches_try_insert() {
        let mut table: ElementTable<&str, ByValue> = ElementTable::new();
        assert!(table.insert("a"));
        assert!(!table.insert("a"));
        assert!(table.contains(&"a"));
    }

    #[rstest]
    fn test_remove_absent_returns_false() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        table.insert(1);
        assert!(!table.remove(&2));
        assert_eq!(table.len(), 1);
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(9)]
    fn test_remove_repairs_moved_position(#[case] removed: i32) {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        for element in 0..10 {
            table.insert(element);
        }

        assert!(table.remove(&removed));
        assert!(!table.contains(&removed));
        assert_eq!(table.len(), 9);
        assert_index_consistent(&table);
    }

    #[rstest]
    fn test_colliding_hashes_share_a_bucket() {
        let mut table: ElementTable<i32, Colliding> = ElementTable::new();
        for element in 0..5 {
            assert!(table.insert(element));
        }
        assert_eq!(table.index.len(), 1);

        assert!(table.remove(&0));
        assert!(table.remove(&3));
        assert_index_consistent(&table);
        assert!(table.contains(&4));
        assert!(!table.contains(&3));

        for element in [1, 2, 4] {
            assert!(table.remove(&element));
        }
        assert!(table.is_empty());
        assert!(table.index.is_empty());
    }

    #[rstest]
    fn test_try_clone_is_independent() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        table.insert(1);
        table.insert(2);

        let mut copy = table.try_clone().unwrap();
        copy.insert(3);
        copy.remove(&1);

        assert_eq!(table.len(), 2);
        assert!(table.contains(&1));
        assert!(!table.contains(&3));
        assert!(copy.contains(&3));
        assert!(!copy.contains(&1));
        assert_index_consistent(&copy);
    }

    #[rstest]
    fn test_try_clone_preserves_identity_membership() {
        let first = Arc::new(String::from("x"));
        let second = Arc::new(String::from("x"));

        let mut table: ElementTable<Arc<String>, ByIdentity> = ElementTable::new();
        table.insert(Arc::clone(&first));
        table.insert(Arc::clone(&second));

        let copy = table.try_clone().unwrap();
        assert_eq!(copy.len(), 2);
        assert!(copy.contains(&first));
        assert!(!copy.contains(&Arc::new(String::from("x"))));
    }

    #[rstest]
    fn test_try_reserve_overflow_is_reported() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        let failure = table.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(failure.requested, usize::MAX);
        assert!(table.is_empty());
    }

    #[rstest]
    fn test_clear_empties_elements_and_index() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        table.insert(1);
        table.clear();
        assert!(table.is_empty());
        assert!(table.index.is_empty());
    }

    #[rstest]
    fn test_get_is_positional() {
        let mut table: ElementTable<i32, ByValue> = ElementTable::new();
        table.insert(10);
        assert_eq!(table.get(0), Some(&10));
        assert_eq!(table.get(1), None);
    }
}
