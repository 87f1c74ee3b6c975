//! Immutable views of a [`CopyOnWriteSet`](super::CopyOnWriteSet).
//!
//! A [`Snapshot`] shares the set's backing table instead of copying it. The
//! set never mutates a table once a snapshot of it exists; the next mutation
//! copies the table and publishes the copy, leaving the snapshot untouched.

use std::fmt;
use std::iter::FusedIterator;
use std::sync::Arc;

use super::membership::{ByValue, Membership};
use super::table::ElementTable;

/// A frozen, reference-counted view of the elements of a set.
///
/// Cloning a snapshot is O(1) and shares the same table. Snapshots can be
/// sent to and read from other threads while the originating set keeps
/// changing.
///
/// # Examples
///
/// ```rust
/// use cowset::concurrent::CopyOnWriteSet;
///
/// let set: CopyOnWriteSet<i32> = [1, 2].into_iter().collect();
/// let snapshot = set.snapshot();
///
/// set.add(3).unwrap();
/// set.remove(&1).unwrap();
///
/// assert_eq!(snapshot.len(), 2);
/// assert!(snapshot.contains(&1));
/// assert!(!snapshot.contains(&3));
/// ```
pub struct Snapshot<T, M = ByValue> {
    elements: Arc<ElementTable<T, M>>,
}

impl<T, M> Snapshot<T, M> {
    pub(crate) const fn new(elements: Arc<ElementTable<T, M>>) -> Self {
        Self { elements }
    }

    /// Returns the number of elements in the snapshot.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if the snapshot contains no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the elements as a slice, in unspecified order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        self.elements.as_slice()
    }

    /// Returns an iterator over references to the elements.
    #[inline]
    pub fn iter(&self) -> SnapshotIterator<'_, T> {
        SnapshotIterator {
            inner: self.elements.as_slice().iter(),
        }
    }

    /// Returns `true` if both snapshots share the same backing table.
    ///
    /// Two snapshots taken with no mutation in between always share a table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cowset::concurrent::CopyOnWriteSet;
    ///
    /// let set: CopyOnWriteSet<i32> = CopyOnWriteSet::new();
    /// let first = set.snapshot();
    /// let second = set.snapshot();
    /// assert!(first.ptr_eq(&second));
    ///
    /// set.add(1).unwrap();
    /// assert!(!first.ptr_eq(&set.snapshot()));
    /// ```
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.elements, &other.elements)
    }
}

impl<T: Clone, M> Snapshot<T, M> {
    /// Copies the elements into a `Vec`, in unspecified order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.elements.as_slice().to_vec()
    }
}

impl<T, M: Membership<T>> Snapshot<T, M> {
    /// Returns `true` if the snapshot contains a member equivalent to
    /// `element`.
    #[must_use]
    pub fn contains(&self, element: &T) -> bool {
        self.elements.contains(element)
    }
}

impl<T, M> Clone for Snapshot<T, M> {
    fn clone(&self) -> Self {
        Self {
            elements: Arc::clone(&self.elements),
        }
    }
}

impl<T: fmt::Debug, M> fmt::Debug for Snapshot<T, M> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<'a, T, M> IntoIterator for &'a Snapshot<T, M> {
    type Item = &'a T;
    type IntoIter = SnapshotIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An iterator over references to the elements of a [`Snapshot`].
pub struct SnapshotIterator<'a, T> {
    inner: std::slice::Iter<'a, T>,
}

impl<'a, T> Iterator for SnapshotIterator<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for SnapshotIterator<'_, T> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<T> FusedIterator for SnapshotIterator<'_, T> {}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize, M> serde::Serialize for Snapshot<T, M> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

// =============================================================================
// Tests
// =============================================================================
