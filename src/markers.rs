//! Marker types and traits defining the lifetime policy of a box.
//!
//! A policy marker is the first type parameter of
//! [`AnyBox<P, A>`](crate::AnyBox). It decides, at compile time, which
//! operations the box offers and which trait bounds a value must satisfy to be
//! stored:
//!
//! - [`Unique`]: any `'static` value may be stored; the box can move its
//!   value but never copy it. The box does not implement `Clone`.
//! - [`Normal`]: stored values must be `Clone`; the box itself is `Clone`,
//!   and cloning runs the value's `Clone` implementation.
//! - [`Trivial`]: stored values must be `Copy`; the box is `Clone` and
//!   copies are plain `memcpy`s that cannot fail.
//!
//! # Design Philosophy
//!
//! The constraints encoded by these markers are enforced at construction
//! time: the only way to put a value into a box is through [`Boxable<P>`],
//! whose blanket implementations exist exactly when the value satisfies the
//! policy's bounds. Once a value is stored its type is erased, so the vtable
//! captured at that moment is the box's entire knowledge of the value — an
//! `AnyBox<Normal>` can always clone what it holds because nothing without
//! `Clone` could ever have entered it.
//!
//! # Policy Ceilings
//!
//! Each policy carries a [`LifetimeReq`] ceiling. The descriptor recorded for
//! a stored value is the value's actual support capped at that ceiling, so a
//! `Copy` type stored in an `AnyBox<Unique>` still reports its copy
//! operations as unavailable. The ceiling caps; it never lifts.
//!
//! # Examples
//!
//! ```
//! use anybox::{NormalBox, UniqueBox};
//!
//! // Normal boxes require Clone and are themselves Clone.
//! let mut a: NormalBox = NormalBox::new();
//! a.emplace(String::from("shared"));
//! let b = a.clone();
//! assert_eq!(b.get::<String>(), Some(&String::from("shared")));
//!
//! // Unique boxes accept move-only values but never clone.
//! struct Token(#[allow(dead_code)] u32);
//! let mut u: UniqueBox = UniqueBox::new();
//! u.emplace(Token(7));
//! assert!(u.is_type::<Token>());
//! ```

use anybox_internals::{LifetimeReq, ValueVtable};

/// Policy marker for move-only boxes.
///
/// Accepts any `'static` value. The box supports emplace, access, take,
/// transfer and swap, but not cloning — neither of the box nor of the value.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Unique;

/// Policy marker for cloneable boxes.
///
/// Accepts `Clone` values. The box implements `Clone`, and
/// [`clone_value_from`](crate::AnyBox::clone_value_from) is available for
/// assigning one box's value into another without reallocating when the types
/// match.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Normal;

/// Policy marker for trivially copyable boxes.
///
/// Accepts `Copy` values. Clones are bitwise and recorded as infallible in
/// the stored value's [`LifetimeReq`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Trivial;

mod sealed_lifetime_policy {
    use super::*;

    pub trait Sealed: 'static {}

    impl Sealed for Unique {}
    impl Sealed for Normal {}
    impl Sealed for Trivial {}
}

/// Marker trait implemented by the three lifetime policies.
///
/// This trait is sealed and cannot be implemented outside of this crate. You
/// should use the provided implementations for [`Unique`], [`Normal`] and
/// [`Trivial`].
pub trait LifetimePolicy: sealed_lifetime_policy::Sealed {
    /// The upper bound on the [`LifetimeReq`] a value stored under this
    /// policy may report.
    const CEILING: LifetimeReq;
}

impl LifetimePolicy for Unique {
    const CEILING: LifetimeReq = LifetimeReq::unique();
}
impl LifetimePolicy for Normal {
    const CEILING: LifetimeReq = LifetimeReq::normal();
}
impl LifetimePolicy for Trivial {
    const CEILING: LifetimeReq = LifetimeReq::trivial();
}

/// Marker trait for policies whose boxes implement `Clone`.
///
/// Implemented for [`Normal`] and [`Trivial`]: under those policies every
/// stored value is guaranteed to carry a clone-construct dispatcher, so
/// cloning the box cannot hit a missing operation.
pub trait CloneablePolicy: LifetimePolicy {}

impl CloneablePolicy for Normal {}
impl CloneablePolicy for Trivial {}

/// A value that may be stored in a box under policy `P`.
///
/// The blanket implementations tie each policy to its bounds: every
/// `'static` type is `Boxable<Unique>`, every `Clone` type is
/// `Boxable<Normal>`, and every `Copy` type is `Boxable<Trivial>`. The
/// [`vtable`](Boxable::vtable) method is how the box captures the value's
/// operations at the moment of storage.
pub trait Boxable<P: LifetimePolicy>: 'static {
    /// The dispatch table recorded when a value of this type is stored.
    fn vtable() -> &'static ValueVtable;
}

impl<T: 'static> Boxable<Unique> for T {
    fn vtable() -> &'static ValueVtable {
        ValueVtable::unique::<T>()
    }
}

impl<T: Clone + 'static> Boxable<Normal> for T {
    fn vtable() -> &'static ValueVtable {
        ValueVtable::cloneable::<T>()
    }
}

impl<T: Copy + 'static> Boxable<Trivial> for T {
    fn vtable() -> &'static ValueVtable {
        ValueVtable::trivial::<T>()
    }
}

/// A [`Boxable`] value that can additionally be default-constructed in
/// place.
///
/// Stable Rust cannot detect `Default` on an arbitrary `T`, so the
/// default-construct dispatcher is only recorded when storage goes through
/// this trait — [`emplace_default`](crate::AnyBox::emplace_default) and
/// [`emplace_slice_default`](crate::AnyBox::emplace_slice_default) name their
/// element type explicitly and pick up the richer vtable here.
pub trait DefaultBoxable<P: LifetimePolicy>: Boxable<P> + Default {
    /// The dispatch table including the default-construct slot.
    fn vtable_with_default() -> &'static ValueVtable;
}

impl<T: Default + 'static> DefaultBoxable<Unique> for T {
    fn vtable_with_default() -> &'static ValueVtable {
        ValueVtable::unique_defaultable::<T>()
    }
}

impl<T: Clone + Default + 'static> DefaultBoxable<Normal> for T {
    fn vtable_with_default() -> &'static ValueVtable {
        ValueVtable::cloneable_defaultable::<T>()
    }
}

impl<T: Copy + Default + 'static> DefaultBoxable<Trivial> for T {
    fn vtable_with_default() -> &'static ValueVtable {
        ValueVtable::trivial_defaultable::<T>()
    }
}
