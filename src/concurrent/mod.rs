//! Concurrent collections with deferred copy-on-write.
//!
//! This module provides:
//!
//! - [`CopyOnWriteSet`]: a shared, mutable set whose backing table is copied
//!   only when a mutation would otherwise change a view that has escaped
//! - [`Snapshot`]: an immutable, reference-counted view of the set
//! - [`Iter`]: a lazy iterator over a frozen view that can remove from the
//!   live set
//! - [`ByValue`] / [`ByIdentity`]: membership strategies
//!
//! # Escape Tracking
//!
//! ```text
//!              add / remove (in place)
//!            ┌─────────────┐
//!            ▼             │
//!      ┌───────────┐  snapshot / iter   ┌───────────┐
//!      │ exclusive │ ─────────────────► │  escaped  │
//!      └───────────┘                    └───────────┘
//!            ▲                                │
//!            └────────────────────────────────┘
//!              add / remove (copy, mutate, publish)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use cowset::concurrent::CopyOnWriteSet;
//!
//! let set: CopyOnWriteSet<i32> = (1..=3).collect();
//!
//! let mut iterator = set.iter();
//! set.add(4).unwrap();
//!
//! // The iterator walks the table as it was when it was obtained.
//! let mut seen: Vec<i32> = iterator.by_ref().collect();
//! seen.sort_unstable();
//! assert_eq!(seen, vec![1, 2, 3]);
//! assert!(set.contains(&4));
//! ```
//!
//! ## Identity Membership
//!
//! ```rust
//! use cowset::concurrent::{ByIdentity, CopyOnWriteSet};
//! use std::sync::Arc;
//!
//! let set: CopyOnWriteSet<Arc<String>, ByIdentity> = CopyOnWriteSet::new();
//! set.add(Arc::new("x".to_string())).unwrap();
//! set.add(Arc::new("x".to_string())).unwrap();
//!
//! // Equal values, distinct allocations.
//! assert_eq!(set.len(), 2);
//! ```

// =============================================================================
// Index Hasher Type Alias
// =============================================================================

/// Build hasher used by the membership index of every element table.
///
/// When the `fxhash` feature is enabled, this is `rustc_hash::FxBuildHasher`.
/// When only the `ahash` feature is enabled, this is `ahash::RandomState`.
/// Otherwise it is the standard library's randomly seeded `RandomState`.
#[cfg(feature = "fxhash")]
pub(crate) type IndexBuildHasher = rustc_hash::FxBuildHasher;

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
pub(crate) type IndexBuildHasher = ahash::RandomState;

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
pub(crate) type IndexBuildHasher = std::collections::hash_map::RandomState;

mod copy_on_write_set;
mod error;
mod membership;
mod snapshot;
mod table;

pub use copy_on_write_set::CopyOnWriteSet;
pub use copy_on_write_set::Iter;
pub use error::CopyOnWriteSetError;
pub use membership::Address;
pub use membership::ByIdentity;
pub use membership::ByValue;
pub use membership::Identity;
pub use membership::Membership;
pub use snapshot::Snapshot;
pub use snapshot::SnapshotIterator;

// =============================================================================
// Tests
// =============================================================================
