//! Thread-safe set with deferred copy-on-write.
//!
//! This module provides [`CopyOnWriteSet`], a shared mutable set whose backing
//! table is copied only when a mutation would otherwise be visible through a
//! view handed out earlier, and [`Iter`], the lazy iterator over such a view.
//!
//! # Overview
//!
//! The set guards two fields together: the current backing table and an
//! `escaped` flag.
//!
//! - [`snapshot`](CopyOnWriteSet::snapshot) and [`iter`](CopyOnWriteSet::iter)
//!   share the current table with the caller and set `escaped`.
//! - [`add`](CopyOnWriteSet::add) and [`remove`](CopyOnWriteSet::remove) mutate
//!   the table in place while `escaped` is clear. Once it is set, they copy
//!   the table, mutate the copy, publish it and clear `escaped`, all within
//!   one critical section.
//! - [`contains`](CopyOnWriteSet::contains) and [`len`](CopyOnWriteSet::len)
//!   never touch `escaped` and never copy.
//!
//! A table that has escaped is therefore never written again: whoever holds
//! it sees it exactly as it was when it was handed out.
//!
//! # Time Complexity
//!
//! | Operation              | Not escaped        | Escaped          |
//! |------------------------|--------------------|------------------|
//! | `add`                  | O(1) amortized     | O(n) (copy)      |
//! | `remove`               | O(1) expected      | O(n) (copy)      |
//! | `contains`             | O(1) expected      | O(1) expected    |
//! | `len`                  | O(1)               | O(1)             |
//! | `snapshot` / `iter`    | O(1)               | O(1)             |
//!
//! # Locking
//!
//! The state lives in a `parking_lot::RwLock`. `contains` and `len` take the
//! read side, so they never wait for one another and always see a whole
//! table. In-place mutations, `snapshot`, `iter` and the final publish of a
//! copy take the write side; readers wait only for those short sections.
//! Copying an escaped table, which clones every element, runs under an
//! upgradable read lock: other mutations, `snapshot` and `iter` wait for it,
//! readers do not. No lock is held while caller code that could re-enter the
//! set runs: iterators, snapshots, serialization and `Debug` all work on
//! shared tables outside the lock.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use super::error::CopyOnWriteSetError;
use super::membership::{ByValue, Membership};
use super::snapshot::Snapshot;
use super::table::{ElementTable, ReserveFailure};

// =============================================================================
// CopyOnWriteSet Definition
// =============================================================================

/// A thread-safe set that copies its backing table only after the table has
/// escaped through [`snapshot`](Self::snapshot) or [`iter`](Self::iter).
///
/// The membership strategy `M` is fixed by the type: [`ByValue`] (the
/// default) compares elements with `Eq`, [`ByIdentity`](super::ByIdentity)
/// compares the allocations they point at. Element order is unspecified.
///
/// Only `snapshot`, `iter` and serialization hand the table out. Formatting
/// the set with `{:?}` reads the current table without marking it escaped,
/// so logging a set does not make the next mutation copy.
///
/// # Thread Safety
///
/// `CopyOnWriteSet<T, M>` is `Send` and `Sync` when `T` is. Share it behind
/// an `Arc` or a scoped borrow.
///
/// # Examples
///
/// ```rust
/// use cowset::concurrent::CopyOnWriteSet;
///
/// let set: CopyOnWriteSet<&str> = CopyOnWriteSet::new();
/// set.add("a").unwrap();
/// set.add("b").unwrap();
///
/// assert_eq!(set.len(), 2);
/// assert!(set.contains(&"a"));
/// assert!(set.remove(&"a").unwrap());
/// assert!(!set.remove(&"a").unwrap());
/// ```
///
/// ## Concurrent Access
///
/// ```rust
/// use cowset::concurrent::CopyOnWriteSet;
/// use std::thread;
///
/// let set: CopyOnWriteSet<u32> = CopyOnWriteSet::new();
///
/// thread::scope(|scope| {
///     for worker in 0..4 {
///         let set = &set;
///         scope.spawn(move || {
///             for element in 0..100 {
///                 set.add(worker * 100 + element).unwrap();
///             }
///         });
///     }
/// });
///
/// assert_eq!(set.len(), 400);
/// ```
pub struct CopyOnWriteSet<T, M = ByValue> {
    state: RwLock<SetState<T, M>>,
}

/// The fields guarded together by the set's lock.
struct SetState<T, M> {
    elements: Arc<ElementTable<T, M>>,
    /// Set while `elements` may be held outside the set.
    escaped: bool,
}

static_assertions::assert_impl_all!(CopyOnWriteSet<i32>: Send, Sync);
static_assertions::assert_impl_all!(CopyOnWriteSet<String>: Send, Sync);
static_assertions::assert_impl_all!(Snapshot<String>: Send, Sync);
static_assertions::assert_not_impl_any!(CopyOnWriteSet<std::rc::Rc<i32>, super::ByIdentity>: Send, Sync);

impl<T, M> CopyOnWriteSet<T, M> {
    /// Creates a new empty set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::{ByIdentity, CopyOnWriteSet};
    /// use std::sync::Arc;
    ///
    /// let by_value: CopyOnWriteSet<String> = CopyOnWriteSet::new();
    /// let by_identity: CopyOnWriteSet<Arc<String>, ByIdentity> = CopyOnWriteSet::new();
    ///
    /// assert!(by_value.is_empty());
    /// assert!(by_identity.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SetState {
                elements: Arc::new(ElementTable::new()),
                escaped: false,
            }),
        }
    }

    /// Returns the number of elements in the set.
    ///
    /// Racing with a mutation on another thread, the result reflects either
    /// the table before or the table after that mutation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<i32> = CopyOnWriteSet::new();
    /// set.add(1).unwrap();
    /// set.add(1).unwrap();
    /// assert_eq!(set.len(), 1);
    /// ```
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().elements.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().elements.is_empty()
    }

    /// Hands the current table to the caller and marks it as escaped.
    fn escape(&self) -> Arc<ElementTable<T, M>> {
        let mut state = self.state.write();
        if !state.escaped {
            trace!(len = state.elements.len(), "element table escaped");
        }
        state.escaped = true;
        Arc::clone(&state.elements)
    }

    /// Returns an immutable view of the whole set without copying it.
    ///
    /// The view stays exactly as it is now for as long as it is held: the
    /// next mutation of the set copies the table before changing it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<&str> = CopyOnWriteSet::new();
    /// let before = set.snapshot();
    /// set.add("z").unwrap();
    ///
    /// assert_eq!(before.len(), 0);
    /// assert_eq!(set.len(), 1);
    /// ```
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T, M> {
        Snapshot::new(self.escape())
    }

    /// Returns a lazy iterator over the elements as they are now.
    ///
    /// Elements are yielded as clones. The iterator is not affected by later
    /// `add`/`remove` calls; see [`Iter::remove`] for removing the element it
    /// yielded last from the set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<&str> = CopyOnWriteSet::new();
    /// set.add("a").unwrap();
    ///
    /// let iterator = set.iter();
    /// set.add("b").unwrap();
    ///
    /// assert_eq!(iterator.collect::<Vec<_>>(), vec!["a"]);
    /// assert!(set.contains(&"b"));
    /// assert_eq!(set.len(), 2);
    /// ```
    pub fn iter(&self) -> Iter<'_, T, M> {
        Iter {
            set: self,
            elements: self.escape(),
            cursor: 0,
            last: None,
        }
    }

    /// Removes every element.
    ///
    /// An escaped table is replaced by a fresh empty one instead of being
    /// copied.
    pub fn clear(&self) {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if !state.escaped
            && let Some(elements) = Arc::get_mut(&mut state.elements)
        {
            elements.clear();
            return;
        }
        state.elements = Arc::new(ElementTable::new());
        state.escaped = false;
    }
}

impl<T: Clone, M: Membership<T>> CopyOnWriteSet<T, M> {
    /// Returns `true` if membership is decided by identity.
    #[inline]
    #[must_use]
    pub const fn is_identity_mode(&self) -> bool {
        M::IDENTITY
    }

    /// Runs `mutation` on a table nobody outside the set can observe.
    ///
    /// Not escaped: the current table is mutated in place under the write
    /// lock. Escaped: the table is copied and the copy mutated under an
    /// upgradable read lock, so `contains` and `len` keep answering from the
    /// escaped table meanwhile; the lock is upgraded only to publish the copy
    /// and clear `escaped`. If the copy or the mutation fails, the set keeps
    /// its current table.
    fn mutate<R>(
        &self,
        operation: &'static str,
        mutation: impl FnOnce(&mut ElementTable<T, M>) -> Result<R, ReserveFailure>,
    ) -> Result<R, CopyOnWriteSetError> {
        let mut guard = self.state.upgradable_read();

        if !guard.escaped {
            let mut exclusive = RwLockUpgradableReadGuard::upgrade(guard);
            // Exclusive ownership of the Arc is what "not escaped" means.
            if let Some(elements) = Arc::get_mut(&mut exclusive.elements) {
                return mutation(elements).map_err(|failure| exhausted(operation, failure));
            }
            // Shared without escaping, e.g. by a `Debug` call still in flight.
            guard = RwLockWriteGuard::downgrade_to_upgradable(exclusive);
        }

        let mut copy = guard
            .elements
            .try_clone()
            .map_err(|failure| exhausted(operation, failure))?;
        let outcome = mutation(&mut copy).map_err(|failure| exhausted(operation, failure))?;

        let mut state = RwLockUpgradableReadGuard::upgrade(guard);
        trace!(
            operation,
            previous_len = state.elements.len(),
            len = copy.len(),
            "published copy of escaped element table"
        );
        state.elements = Arc::new(copy);
        state.escaped = false;
        Ok(outcome)
    }

    /// Adds `element` to the set. Adding a member that is already present
    /// has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`CopyOnWriteSetError::ResourceExhausted`] if the table cannot
    /// grow, or cannot be copied after an escape. The set is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<String> = CopyOnWriteSet::new();
    /// set.add("x".to_string()).unwrap();
    /// set.add("x".to_string()).unwrap();
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn add(&self, element: T) -> Result<(), CopyOnWriteSetError> {
        self.mutate("add", |elements| {
            elements.try_insert(element).map(|_inserted| ())
        })
    }

    /// Adds every element of `elements` within a single critical section,
    /// copying the table at most once.
    ///
    /// The iterator is drained before the lock is taken, and room for all
    /// elements is reserved before the first insert.
    ///
    /// # Errors
    ///
    /// Returns [`CopyOnWriteSetError::ResourceExhausted`] if the room cannot
    /// be reserved. The set is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<i32> = CopyOnWriteSet::new();
    /// set.add_all([1, 2, 2, 3]).unwrap();
    /// assert_eq!(set.len(), 3);
    /// ```
    pub fn add_all<I>(&self, elements: I) -> Result<(), CopyOnWriteSetError>
    where
        I: IntoIterator<Item = T>,
    {
        let pending: Vec<T> = elements.into_iter().collect();
        self.mutate("add_all", |table| {
            table.try_reserve(pending.len())?;
            for element in pending {
                table.try_insert(element)?;
            }
            Ok(())
        })
    }

    /// Removes `element` from the set.
    ///
    /// Returns `Ok(true)` if a member equivalent to `element` was present and
    /// has been removed from the set's current table.
    ///
    /// # Errors
    ///
    /// Returns [`CopyOnWriteSetError::ResourceExhausted`] if the table has
    /// escaped and cannot be copied. The set is unchanged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<&str> = CopyOnWriteSet::new();
    /// set.add("a").unwrap();
    ///
    /// assert!(set.remove(&"a").unwrap());
    /// assert!(!set.remove(&"a").unwrap());
    /// ```
    pub fn remove(&self, element: &T) -> Result<bool, CopyOnWriteSetError> {
        self.mutate("remove", |elements| Ok(elements.remove(element)))
    }

    /// Returns `true` if the set contains a member equivalent to `element`.
    ///
    /// Racing with a mutation on another thread, the answer reflects either
    /// the table before or the table after that mutation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<i32> = [1, 2].into_iter().collect();
    /// assert!(set.contains(&1));
    /// assert!(!set.contains(&3));
    /// ```
    #[must_use]
    pub fn contains(&self, element: &T) -> bool {
        self.state.read().elements.contains(element)
    }
}

fn exhausted(operation: &'static str, failure: ReserveFailure) -> CopyOnWriteSetError {
    debug!(
        operation,
        requested = failure.requested,
        error = %failure.source,
        "element table reservation failed"
    );
    CopyOnWriteSetError::ResourceExhausted {
        operation,
        requested: failure.requested,
        source: failure.source,
    }
}

impl<T, M> Default for CopyOnWriteSet<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, M: Membership<T>> FromIterator<T> for CopyOnWriteSet<T, M> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table: ElementTable<T, M> = ElementTable::new();
        for element in iter {
            table.insert(element);
        }
        Self {
            state: RwLock::new(SetState {
                elements: Arc::new(table),
                escaped: false,
            }),
        }
    }
}

impl<'a, T: Clone, M> IntoIterator for &'a CopyOnWriteSet<T, M> {
    type Item = T;
    type IntoIter = Iter<'a, T, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Formats the current elements without marking the table as escaped.
///
/// The table is shared only for the duration of the call; a mutation racing
/// with it copies the table instead of mutating it in place.
impl<T: fmt::Debug, M> fmt::Debug for CopyOnWriteSet<T, M> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements = Arc::clone(&self.state.read().elements);
        formatter
            .debug_struct("CopyOnWriteSet")
            .field("elements", &Snapshot::new(elements))
            .finish()
    }
}

// =============================================================================
// Iter Definition
// =============================================================================

/// A lazy iterator over the table a [`CopyOnWriteSet`] had when
/// [`CopyOnWriteSet::iter`] was called.
///
/// The iterator owns a share of that table, so it neither blocks nor sees
/// later mutations of the set.
pub struct Iter<'a, T, M = ByValue> {
    set: &'a CopyOnWriteSet<T, M>,
    elements: Arc<ElementTable<T, M>>,
    cursor: usize,
    /// Position of the element yielded last, cleared by `remove`.
    last: Option<usize>,
}

impl<T, M> Iter<'_, T, M> {
    /// Returns a snapshot of the table this iterator walks.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T, M> {
        Snapshot::new(Arc::clone(&self.elements))
    }
}

impl<T: Clone, M: Membership<T>> Iter<'_, T, M> {
    /// Removes the element yielded last from the set.
    ///
    /// The element stays in the table this iterator walks; iteration goes on
    /// over the same elements as before. Returns `Ok(true)` if the element
    /// was still in the set.
    ///
    /// # Errors
    ///
    /// - [`CopyOnWriteSetError::InvalidIteratorState`] if `next` has not
    ///   yielded an element since the iterator was created or since the
    ///   previous `remove`.
    /// - [`CopyOnWriteSetError::ResourceExhausted`] if the set's table cannot
    ///   be copied.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<i32> = [1, 2].into_iter().collect();
    /// let mut iterator = set.iter();
    ///
    /// let first = iterator.next().unwrap();
    /// assert!(iterator.remove().unwrap());
    /// assert!(!set.contains(&first));
    ///
    /// // The removed element does not shorten the walk.
    /// assert_eq!(iterator.count(), 1);
    /// ```
    pub fn remove(&mut self) -> Result<bool, CopyOnWriteSetError> {
        let element = self
            .last
            .take()
            .and_then(|position| self.elements.get(position))
            .ok_or(CopyOnWriteSetError::InvalidIteratorState)?;
        self.set.remove(element)
    }
}

impl<T: Clone, M> Iterator for Iter<'_, T, M> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.elements.get(self.cursor)?.clone();
        self.last = Some(self.cursor);
        self.cursor += 1;
        Some(element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.elements.len().saturating_sub(self.cursor);
        (remaining, Some(remaining))
    }
}

impl<T: Clone, M> ExactSizeIterator for Iter<'_, T, M> {}

impl<T: Clone, M> FusedIterator for Iter<'_, T, M> {}

impl<T, M> fmt::Debug for Iter<'_, T, M> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Iter")
            .field("position", &self.cursor)
            .field("len", &self.elements.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize, M> serde::Serialize for CopyOnWriteSet<T, M> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&self.snapshot(), serializer)
    }
}

#[cfg(feature = "serde")]
struct CopyOnWriteSetVisitor<T, M> {
    marker: std::marker::PhantomData<fn() -> (T, M)>,
}

#[cfg(feature = "serde")]
impl<T, M> CopyOnWriteSetVisitor<T, M> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T, M> serde::de::Visitor<'de> for CopyOnWriteSetVisitor<T, M>
where
    T: serde::Deserialize<'de> + Clone,
    M: Membership<T>,
{
    type Value = CopyOnWriteSet<T, M>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let set = CopyOnWriteSet::new();
        while let Some(element) = seq.next_element()? {
            set.add(element).map_err(serde::de::Error::custom)?;
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, M> serde::Deserialize<'de> for CopyOnWriteSet<T, M>
where
    T: serde::Deserialize<'de> + Clone,
    M: Membership<T>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(CopyOnWriteSetVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
impl<T, M> CopyOnWriteSet<T, M> {
    fn is_escaped(&self) -> bool {
        self.state.read().escaped
    }

    fn table_address(&self) -> *const ElementTable<T, M> {
        Arc::as_ptr(&self.state.read().elements)
    }
}
