//! Membership strategies.
//!
//! A [`Membership`] strategy decides when two elements count as the same
//! member of a set. It is a type parameter of the set, so the choice is made
//! once, at construction, and cannot change for the lifetime of an instance.
//!
//! - [`ByValue`]: members are compared with `Hash` + `Eq`
//! - [`ByIdentity`]: members are compared by the [`Address`] they point at

use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// Decides how elements of type `T` are hashed and compared for membership.
///
/// Implementations must be consistent: whenever `same(a, b)` holds,
/// `hash(a, ..)` and `hash(b, ..)` must feed identical data to the hasher.
pub trait Membership<T: ?Sized> {
    /// `true` when membership is decided by identity rather than by value.
    const IDENTITY: bool;

    /// Feeds the membership key of `element` into `state`.
    fn hash<H: Hasher>(element: &T, state: &mut H);

    /// Returns `true` if `left` and `right` are the same member.
    fn same(left: &T, right: &T) -> bool;
}

/// Value-based membership: two elements are the same member when they are
/// equal according to `Eq`.
///
/// # Examples
///
/// ```rust
/// use cowset::concurrent::{ByValue, Membership};
///
/// assert!(<ByValue as Membership<String>>::same(&"x".to_string(), &"x".to_string()));
/// assert!(!<ByValue as Membership<String>>::IDENTITY);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByValue;

impl<T: Hash + Eq + ?Sized> Membership<T> for ByValue {
    const IDENTITY: bool = false;

    #[inline]
    fn hash<H: Hasher>(element: &T, state: &mut H) {
        element.hash(state);
    }

    #[inline]
    fn same(left: &T, right: &T) -> bool {
        left == right
    }
}

/// Identity-based membership: two elements are the same member only when
/// they refer to the same allocation.
///
/// # Examples
///
/// ```rust
/// use cowset::concurrent::{ByIdentity, Membership};
/// use std::sync::Arc;
///
/// let first = Arc::new(1);
/// let second = Arc::new(1);
///
/// assert!(<ByIdentity as Membership<Arc<i32>>>::same(&first, &Arc::clone(&first)));
/// assert!(!<ByIdentity as Membership<Arc<i32>>>::same(&first, &second));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByIdentity;

impl<T: Identity + ?Sized> Membership<T> for ByIdentity {
    const IDENTITY: bool = true;

    #[inline]
    fn hash<H: Hasher>(element: &T, state: &mut H) {
        element.identity().hash(state);
    }

    #[inline]
    fn same(left: &T, right: &T) -> bool {
        left.identity() == right.identity()
    }
}

/// The location and size of a referent.
///
/// The size tells apart referents that start at the same address, such as
/// `&text[..1]` and `&text[..]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    start: *const (),
    size: usize,
}

impl Address {
    /// Returns the address of `referent`.
    #[inline]
    #[must_use]
    pub fn of<U: ?Sized>(referent: &U) -> Self {
        Self {
            start: std::ptr::from_ref::<U>(referent).cast::<()>(),
            size: std::mem::size_of_val(referent),
        }
    }
}

/// Types whose values point at a stable allocation.
///
/// The returned [`Address`] is the identity of the value: clones of an `Arc`
/// share it, separately allocated equal values do not.
///
/// Two caveats follow from identity being an address:
///
/// - A set copies its table by cloning elements, so the address must survive
///   `Clone`. This rules out owning pointers such as `Box`.
/// - Zero-sized values occupy no memory, so references to distinct
///   zero-sized values may share an address and count as one member.
pub trait Identity {
    /// Returns the address that identifies this value.
    fn identity(&self) -> Address;
}

impl<U: ?Sized> Identity for Arc<U> {
    #[inline]
    fn identity(&self) -> Address {
        Address::of::<U>(self)
    }
}

impl<U: ?Sized> Identity for Rc<U> {
    #[inline]
    fn identity(&self) -> Address {
        Address::of::<U>(self)
    }
}

impl<U: ?Sized> Identity for &U {
    #[inline]
    fn identity(&self) -> Address {
        Address::of::<U>(*self)
    }
}

// =============================================================================
// Tests
// =============================================================================
