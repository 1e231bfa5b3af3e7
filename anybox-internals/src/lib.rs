#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![cfg_attr(not(test), deny(clippy::missing_docs_in_private_items))]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`anybox`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased data structures and unsafe
//! operations that power the [`anybox`] value container. It provides
//! allocator-aware storage for a single value (or slice) of any `'static`
//! type, with the type's identity erased behind vtable-based dispatch.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`anybox`] crate, not
//! this one.
//!
//! # Architecture
//!
//! The crate is a stack of four layers, each only aware of the ones below it:
//!
//! - **[`allocator`]**: The allocator capability
//!   - [`Allocator`]: Fallible allocation plus an interchangeability contract
//!   - [`Global`]: The global-heap implementation
//! - **[`allocation`]**: The raw memory span
//!   - [`Allocation`]: A `Copy` pointer+layout handle that knows nothing
//!     about what lives inside it
//! - **[`value`]**: Type-erased value dispatch
//!   - [`ValueVtable`]: `&'static` function-pointer table for one element
//!     type, every dispatcher taking an element count
//!   - [`ValueAdaptor`]: A vtable paired with the stored shape (single value
//!     or slice-with-count)
//!   - [`LifetimeReq`]: The per-operation support descriptor recorded in
//!     every table (defined in [`lifetime`], policy-capped by the caller)
//! - **[`boxed`]**: The state machine
//!   - [`RawBox`]: Owns one allocation, at most one adaptor, and an
//!     allocator; implements emplace, access, clone-from, transfer and swap
//!
//! # Safety Strategy
//!
//! Type erasure requires careful handling to maintain Rust's type safety
//! guarantees. Once a value's type is erased, the only record of it is the
//! adaptor, so the function pointers in a vtable must always match the type
//! whose [`TypeId`](core::any::TypeId) the table reports.
//!
//! This crate maintains safety through:
//!
//! - **Module-based encapsulation**: Safety-critical types keep fields
//!   module-private, making invariants locally verifiable within a single
//!   file
//! - **Constructor-only vtables**: Tables are built exclusively by the
//!   `const` constructors in [`value`], which instantiate every pointer with
//!   the same `T` and populate optional slots exactly when the constructor's
//!   bounds establish the operation
//! - **Documented dispatch contracts**: Each unsafe method specifies exactly
//!   when it can be safely called, and [`RawBox`] discharges those contracts
//!   from a single documented invariant
//!
//! [`anybox`]: https://docs.rs/anybox/latest/anybox/
//! [`Allocator`]: crate::allocator::Allocator
//! [`Global`]: crate::allocator::Global
//! [`Allocation`]: crate::allocation::Allocation
//! [`ValueVtable`]: crate::value::ValueVtable
//! [`ValueAdaptor`]: crate::value::ValueAdaptor
//! [`LifetimeReq`]: crate::lifetime::LifetimeReq
//! [`RawBox`]: crate::boxed::RawBox

extern crate alloc;

pub mod allocation;
pub mod allocator;
pub mod boxed;
pub mod lifetime;
pub mod value;

pub use crate::{
    allocation::Allocation,
    allocator::{AllocError, Allocator, Global},
    boxed::RawBox,
    lifetime::{ExprSupport, LifetimeReq, at_least},
    value::{ValueAdaptor, ValueVtable},
};
