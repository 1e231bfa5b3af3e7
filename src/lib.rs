#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! An allocator-aware box for values of any type, with policy-controlled
//! cloning.
//!
//! ## Overview
//!
//! This crate provides [`AnyBox`], a container that stores a single value (or
//! a slice of values) of any `'static` type, erasing the type at runtime
//! while keeping enough knowledge of it to clone, move, swap, and drop it
//! correctly. Unlike `Box<dyn Any>`, an `AnyBox`:
//!
//! - is **allocator-aware**: it draws memory from an [`Allocator`] you pick,
//!   and moves between allocator instances either by stealing the span (when
//!   the allocators are interchangeable) or by relocating the value;
//! - **reuses capacity**: emplacing a new value into a box whose span is
//!   large enough performs no allocation, and assigning between boxes of the
//!   same stored type reuses the destination's value in place;
//! - is **policy-parameterized**: the [`markers`] module defines three
//!   lifetime policies — [`Unique`](markers::Unique) for move-only values,
//!   [`Normal`](markers::Normal) for `Clone` values, and
//!   [`Trivial`](markers::Trivial) for `Copy` values — which decide at
//!   compile time whether the box itself can be cloned;
//! - can hold **slices**: a box can store `n` elements of one type, with the
//!   element count carried alongside the erased type.
//!
//! ## Quick Example
//!
//! ```
//! use anybox::prelude::*;
//!
//! let mut b: NormalBox = NormalBox::new();
//! b.emplace(String::from("hello"));
//!
//! // The stored type is checked at access time.
//! assert_eq!(b.get::<String>().map(String::as_str), Some("hello"));
//! assert!(b.get::<u32>().is_none());
//!
//! // Normal boxes clone through the stored value's `Clone`.
//! let c = b.clone();
//! assert_eq!(c.get::<String>(), b.get::<String>());
//!
//! // Re-emplacing a value that fits reuses the owned span.
//! b.emplace(42u64);
//! assert!(b.is_type::<u64>());
//! ```
//!
//! ## Core Concepts
//!
//! A box is a little state machine: it is either **empty** or **occupied**,
//! and separately it owns a span of raw **capacity** that survives taking or
//! resetting the value. The operations are:
//!
//! - **Emplace** ([`emplace`](AnyBox::emplace) and friends): drop whatever
//!   was stored, make sure the span fits the new value (reallocating only if
//!   it does not), and construct the value in place.
//! - **Access** ([`get`](AnyBox::get), [`get_mut`](AnyBox::get_mut),
//!   [`get_slice`](AnyBox::get_slice)): checked downcasts returning `Option`.
//! - **Take** ([`take`](AnyBox::take)): move the value out, keep capacity.
//! - **Clone-assign** ([`clone_value_from`](AnyBox::clone_value_from)):
//!   assign another box's value into this one, in place when the stored
//!   types match.
//! - **Transfer** ([`transfer`](AnyBox::transfer)) and **swap**
//!   ([`swap_values`](AnyBox::swap_values)): move contents between allocator
//!   instances without ever cloning.
//!
//! Every stored value also records a [`LifetimeReq`] descriptor saying which
//! of the seven special operations it supports and whether they can fail,
//! capped at the policy's ceiling. Descriptors form a lattice; [`at_least`]
//! computes the join of two of them.
//!
//! For implementation details, see the [`anybox-internals`] crate.
//!
//! [`anybox-internals`]: anybox_internals

extern crate alloc;

pub mod markers;
pub mod prelude;

mod boxed;

pub use anybox_internals::{
    AllocError, Allocator, ExprSupport, Global, LifetimeReq, ValueVtable, at_least,
};

pub use crate::boxed::AnyBox;

/// A box for move-only values on an allocator `A`.
///
/// Accepts any `'static` value; does not implement `Clone`.
pub type UniqueBox<A = Global> = AnyBox<markers::Unique, A>;

/// A box for `Clone` values on an allocator `A`.
///
/// The box is `Clone`; cloning runs the stored value's `Clone`.
pub type NormalBox<A = Global> = AnyBox<markers::Normal, A>;

/// A box for `Copy` values on an allocator `A`.
///
/// The box is `Clone`; copies are bitwise and cannot fail.
pub type TrivialBox<A = Global> = AnyBox<markers::Trivial, A>;
