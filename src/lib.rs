//! # cowset
//!
//! A thread-safe, mutable set that copies its backing table lazily.
//!
//! ## Overview
//!
//! Synchronising every access to a set serialises readers behind writers,
//! and copying the set on every write pays for copies nobody needed. The
//! [`CopyOnWriteSet`](concurrent::CopyOnWriteSet) in this crate sits in
//! between:
//!
//! - Mutations edit the backing table in place while nothing outside the set
//!   can see it.
//! - Handing the table out ([`snapshot`](concurrent::CopyOnWriteSet::snapshot)
//!   or [`iter`](concurrent::CopyOnWriteSet::iter)) marks it as escaped.
//! - The next mutation after an escape copies the table first, so every
//!   handed-out view stays frozen for as long as it is held.
//!
//! ## Feature Flags
//!
//! - `fxhash`: hash the membership index with `rustc-hash`
//! - `ahash`: hash the membership index with `ahash`
//! - `serde`: serialization support
//! - `full`: enable all optional features except the hasher choices
//!
//! ## Example
//!
//! ```rust
//! use cowset::prelude::*;
//!
//! let set: CopyOnWriteSet<&str> = CopyOnWriteSet::new();
//! set.add("a").unwrap();
//!
//! let snapshot = set.snapshot();
//! set.add("b").unwrap();
//!
//! assert_eq!(snapshot.len(), 1);
//! assert_eq!(set.len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use cowset::prelude::*;
/// ```
pub mod prelude {
    pub use crate::concurrent::*;
}

pub mod concurrent;
