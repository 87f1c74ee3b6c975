//! Error types for [`CopyOnWriteSet`](super::CopyOnWriteSet).
//!
//! Duplicate inserts and removals of absent elements are ordinary outcomes,
//! not errors. The errors here are either misuse of an iterator or a failed
//! allocation of the table a mutation needed.

use std::collections::TryReserveError;

/// Represents errors reported by [`CopyOnWriteSet`](super::CopyOnWriteSet)
/// and its [`Iter`](super::Iter).
///
/// Every error is reported to the immediate caller and leaves the set in the
/// state it had before the failing call.
///
/// # Examples
///
/// ```rust
/// use cowset::concurrent::{CopyOnWriteSet, CopyOnWriteSetError};
///
/// let set: CopyOnWriteSet<i32> = [1].into_iter().collect();
/// let mut iterator = set.iter();
///
/// assert_eq!(iterator.remove(), Err(CopyOnWriteSetError::InvalidIteratorState));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOnWriteSetError {
    /// `Iter::remove` was called before the first `next`, or twice without an
    /// intervening `next`.
    InvalidIteratorState,
    /// The element table could not be grown or copied.
    ResourceExhausted {
        /// The set operation that needed the memory.
        operation: &'static str,
        /// Number of elements the reservation was made for.
        requested: usize,
        /// The allocator's report.
        source: TryReserveError,
    },
}

impl CopyOnWriteSetError {
    /// Returns `true` if this error reports a failed allocation.
    #[must_use]
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }
}

impl std::fmt::Display for CopyOnWriteSetError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIteratorState => write!(
                formatter,
                "Iter::remove: next has not been called since the last remove"
            ),
            Self::ResourceExhausted {
                operation,
                requested,
                source,
            } => write!(
                formatter,
                "CopyOnWriteSet::{operation}: could not reserve room for {requested} elements: {source}"
            ),
        }
    }
}

impl std::error::Error for CopyOnWriteSetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidIteratorState => None,
            Self::ResourceExhausted { source, .. } => Some(source),
        }
    }
}
