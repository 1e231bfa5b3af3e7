//! Vtable for type-erased value operations.
//!
//! A [`ValueVtable`] is a `&'static` table of function pointers implementing
//! the seven lifetime operations for a concrete element type `T` whose
//! identity has been erased. Every dispatcher takes an element count and
//! loops, so the same table serves a single value (`len == 1`) and a slice
//! (`len == n`); the count itself lives in the
//! [`ValueAdaptor`](super::adaptor::ValueAdaptor).
//!
//! This module encapsulates the function-pointer fields so they cannot be
//! accessed directly. The visibility restriction guarantees the safety
//! invariant: **the pointers of a table always match the element type whose
//! [`TypeId`] the table reports**. Tables are only created by the
//! constructors below, which pair the pointers with a specific `T` inside a
//! `const` block, and the optional slots are populated exactly when the
//! constructor's trait bounds establish the operation — so the slot shape
//! always matches the recorded [`LifetimeReq`].

use core::{
    alloc::Layout,
    any::TypeId,
    ptr::{self, NonNull},
};

use crate::lifetime::{ExprSupport, LifetimeReq};

/// Signature of a dispatcher constructing into a destination span.
pub(super) type ConstructFn = unsafe fn(NonNull<u8>, usize);
/// Signature of a dispatcher reading a source span and writing a destination
/// span.
pub(super) type TransferFn = unsafe fn(NonNull<u8>, NonNull<u8>, usize);

/// Vtable for type-erased value operations.
///
/// # Safety Invariant
///
/// All function-pointer fields are guaranteed to point to the generic
/// functions defined at the bottom of this file, instantiated with the
/// element type `T` that was used to create this table, and `elem_layout`,
/// `type_id` and `type_name` describe that same `T`. `lifetime` reflects
/// exactly which optional slots are populated.
#[derive(Clone, Copy)]
pub struct ValueVtable {
    /// Gets the [`TypeId`] of the element type.
    type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the element type.
    type_name: fn() -> &'static str,
    /// Layout of one element.
    elem_layout: Layout,
    /// Which operations the table provides, and their failure modes.
    lifetime: LifetimeReq,
    /// Default-constructs `len` elements into the destination.
    default_construct: Option<ConstructFn>,
    /// Clone-constructs `len` elements from source into destination.
    clone_construct: Option<TransferFn>,
    /// Bitwise-moves `len` elements from source into destination. The source
    /// becomes logically uninitialized.
    relocate: TransferFn,
    /// Clone-assigns `len` source elements onto live destination elements.
    clone_assign: Option<TransferFn>,
    /// Drops `len` live destination elements, then bitwise-moves `len`
    /// source elements over them. The source becomes logically
    /// uninitialized.
    move_assign: TransferFn,
    /// Drops `len` live elements.
    drop: ConstructFn,
    /// Swaps `len` live elements between two spans.
    swap: TransferFn,
}

/// Builds the table shared by every constructor, with the optional slots and
/// the recorded descriptor supplied by the caller.
macro_rules! table {
    ($ty:ty, $req:expr, default: $default:expr, clone: $clone:expr, assign: $assign:expr $(,)?) => {
        const {
            &ValueVtable {
                type_id: TypeId::of::<$ty>,
                type_name: core::any::type_name::<$ty>,
                elem_layout: Layout::new::<$ty>(),
                lifetime: $req,
                default_construct: $default,
                clone_construct: $clone,
                relocate: relocate::<$ty>,
                clone_assign: $assign,
                move_assign: move_assign::<$ty>,
                drop: drop_in::<$ty>,
                swap: swap::<$ty>,
            }
        }
    };
}

/// Support every `'static` type has: moves, drops and swaps are infallible
/// in Rust; nothing else is known.
const fn base_req() -> LifetimeReq {
    LifetimeReq {
        default_construct: ExprSupport::IllFormed,
        move_construct: ExprSupport::NoException,
        copy_construct: ExprSupport::IllFormed,
        move_assign: ExprSupport::NoException,
        copy_assign: ExprSupport::IllFormed,
        destruct: ExprSupport::NoException,
        swap: ExprSupport::NoException,
    }
}

impl ValueVtable {
    /// Creates the table for a move-only `T` under the unique ceiling.
    pub const fn unique<T: 'static>() -> &'static Self {
        table!(T, base_req().meet(LifetimeReq::unique()), default: None, clone: None, assign: None)
    }

    /// [`unique`](Self::unique) plus the default-construct slot.
    pub const fn unique_defaultable<T: Default + 'static>() -> &'static Self {
        table!(
            T,
            LifetimeReq { default_construct: ExprSupport::WellFormed, ..base_req() }
                .meet(LifetimeReq::unique()),
            default: Some(default_construct::<T>),
            clone: None,
            assign: None,
        )
    }

    /// Creates the table for a cloneable `T` under the normal ceiling.
    pub const fn cloneable<T: Clone + 'static>() -> &'static Self {
        table!(
            T,
            LifetimeReq {
                copy_construct: ExprSupport::WellFormed,
                copy_assign: ExprSupport::WellFormed,
                ..base_req()
            }
            .meet(LifetimeReq::normal()),
            default: None,
            clone: Some(clone_construct::<T>),
            assign: Some(clone_assign::<T>),
        )
    }

    /// [`cloneable`](Self::cloneable) plus the default-construct slot.
    pub const fn cloneable_defaultable<T: Clone + Default + 'static>() -> &'static Self {
        table!(
            T,
            LifetimeReq {
                default_construct: ExprSupport::WellFormed,
                copy_construct: ExprSupport::WellFormed,
                copy_assign: ExprSupport::WellFormed,
                ..base_req()
            }
            .meet(LifetimeReq::normal()),
            default: Some(default_construct::<T>),
            clone: Some(clone_construct::<T>),
            assign: Some(clone_assign::<T>),
        )
    }

    /// Creates the table for a `Copy` `T` under the trivial ceiling.
    ///
    /// Copies are bitwise and therefore recorded as infallible.
    pub const fn trivial<T: Copy + 'static>() -> &'static Self {
        table!(
            T,
            LifetimeReq {
                copy_construct: ExprSupport::NoException,
                copy_assign: ExprSupport::NoException,
                ..base_req()
            }
            .meet(LifetimeReq::trivial()),
            default: None,
            clone: Some(copy_construct::<T>),
            assign: Some(copy_construct::<T>),
        )
    }

    /// [`trivial`](Self::trivial) plus the default-construct slot.
    ///
    /// `Default` runs arbitrary code, so the default slot is only
    /// well-formed, not infallible — the ceiling caps, it never lifts.
    pub const fn trivial_defaultable<T: Copy + Default + 'static>() -> &'static Self {
        table!(
            T,
            LifetimeReq {
                default_construct: ExprSupport::WellFormed,
                copy_construct: ExprSupport::NoException,
                copy_assign: ExprSupport::NoException,
                ..base_req()
            }
            .meet(LifetimeReq::trivial()),
            default: Some(default_construct::<T>),
            clone: Some(copy_construct::<T>),
            assign: Some(copy_construct::<T>),
        )
    }

    /// Gets the [`TypeId`] of the element type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the [`core::any::type_name`] of the element type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Layout of one element.
    #[inline]
    pub fn elem_layout(&self) -> Layout {
        self.elem_layout
    }

    /// The recorded lifetime descriptor.
    #[inline]
    pub fn lifetime(&self) -> LifetimeReq {
        self.lifetime
    }

    /// Default-constructs `len` elements into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the default-construct slot is absent (the recorded
    /// descriptor marks it ill-formed).
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `dst` is valid for writes of `len` elements of the table's type
    ///    and properly aligned.
    /// 2. No live elements are overwritten (the destination is
    ///    uninitialized or its contents were already dropped).
    pub(super) unsafe fn default_construct(&self, dst: NonNull<u8>, len: usize) {
        let Some(f) = self.default_construct else {
            panic!("default-construct invoked on {}, which does not support it", self.type_name());
        };
        // SAFETY: `f` is `default_construct::<T>` for the table's `T`;
        // requirements forwarded from the caller.
        unsafe { f(dst, len) };
    }

    /// Clone-constructs `len` elements from `src` into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the clone-construct slot is absent.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `src` points to `len` live elements of the table's type.
    /// 2. `dst` is valid for writes of `len` elements, aligned, and does not
    ///    overlap `src`.
    /// 3. The destination holds no live elements.
    pub(super) unsafe fn clone_construct(&self, src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
        let Some(f) = self.clone_construct else {
            panic!("clone-construct invoked on {}, which does not support it", self.type_name());
        };
        // SAFETY: `f` matches the table's `T`; requirements forwarded from
        // the caller.
        unsafe { f(src, dst, len) };
    }

    /// Bitwise-moves `len` elements from `src` into `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `src` points to `len` live elements of the table's type.
    /// 2. `dst` is valid for writes of `len` elements, aligned, and does not
    ///    overlap `src`.
    /// 3. The destination holds no live elements.
    /// 4. The source elements are treated as uninitialized afterwards.
    pub(super) unsafe fn relocate(&self, src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
        // SAFETY: `self.relocate` is `relocate::<T>` for the table's `T`;
        // requirements forwarded from the caller.
        unsafe { (self.relocate)(src, dst, len) };
    }

    /// Clone-assigns `len` elements from `src` onto live elements in `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the clone-assign slot is absent.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both spans hold `len` live elements of the table's type.
    /// 2. The spans do not overlap.
    pub(super) unsafe fn clone_assign(&self, src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
        let Some(f) = self.clone_assign else {
            panic!("clone-assign invoked on {}, which does not support it", self.type_name());
        };
        // SAFETY: `f` matches the table's `T`; requirements forwarded from
        // the caller.
        unsafe { f(src, dst, len) };
    }

    /// Drops the live elements in `dst`, then bitwise-moves `src` over them.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both spans hold `len` live elements of the table's type and do not
    ///    overlap.
    /// 2. The source elements are treated as uninitialized afterwards.
    pub(super) unsafe fn move_assign(&self, src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
        // SAFETY: `self.move_assign` is `move_assign::<T>` for the table's
        // `T`; requirements forwarded from the caller.
        unsafe { (self.move_assign)(src, dst, len) };
    }

    /// Drops `len` live elements in `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `dst` points to `len` live elements of the table's type.
    /// 2. The elements are treated as uninitialized afterwards.
    pub(super) unsafe fn drop_in(&self, dst: NonNull<u8>, len: usize) {
        // SAFETY: `self.drop` is `drop_in::<T>` for the table's `T`;
        // requirements forwarded from the caller.
        unsafe { (self.drop)(dst, len) };
    }

    /// Swaps `len` live elements between `a` and `b`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both spans hold `len` live elements of the table's type.
    /// 2. The spans do not overlap.
    pub(super) unsafe fn swap(&self, a: NonNull<u8>, b: NonNull<u8>, len: usize) {
        // SAFETY: `self.swap` is `swap::<T>` for the table's `T`;
        // requirements forwarded from the caller.
        unsafe { (self.swap)(a, b, len) };
    }
}

/// Drops the initialized prefix of a partially constructed span if a
/// constructor panics before finishing.
struct PrefixGuard<T> {
    /// Start of the span being filled.
    ptr: *mut T,
    /// How many elements have been fully constructed so far.
    initialized: usize,
}

impl<T> Drop for PrefixGuard<T> {
    fn drop(&mut self) {
        let prefix = ptr::slice_from_raw_parts_mut(self.ptr, self.initialized);
        // SAFETY: Exactly `initialized` elements were written before the
        // unwind started, and nobody else will touch them.
        unsafe { ptr::drop_in_place(prefix) };
    }
}

/// Default-constructs `len` elements of `T` into `dst`.
///
/// # Safety
///
/// See [`ValueVtable::default_construct`]; additionally `T` must be the
/// table's element type.
unsafe fn default_construct<T: Default>(dst: NonNull<u8>, len: usize) {
    let dst = dst.cast::<T>().as_ptr();
    let mut guard = PrefixGuard { ptr: dst, initialized: 0 };
    for i in 0..len {
        // SAFETY: `dst` is valid for writes of `len` elements (caller) and
        // `i < len`.
        let slot = unsafe { dst.add(i) };
        // SAFETY: In bounds as established above; the slot holds no live
        // element yet.
        unsafe { slot.write(T::default()) };
        guard.initialized = i + 1;
    }
    core::mem::forget(guard);
}

/// Clone-constructs `len` elements of `T` from `src` into `dst`.
///
/// # Safety
///
/// See [`ValueVtable::clone_construct`]; additionally `T` must be the
/// table's element type.
unsafe fn clone_construct<T: Clone>(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    let src = src.cast::<T>().as_ptr();
    let dst = dst.cast::<T>().as_ptr();
    let mut guard = PrefixGuard { ptr: dst, initialized: 0 };
    for i in 0..len {
        // SAFETY: `src` holds `len` live elements (caller) and `i < len`.
        let source = unsafe { src.add(i) };
        // SAFETY: Live element as established above; shared access only.
        let value = unsafe { (*source).clone() };
        // SAFETY: `dst` is valid for writes of `len` elements (caller) and
        // `i < len`.
        let slot = unsafe { dst.add(i) };
        // SAFETY: In bounds as established above; the slot holds no live
        // element yet.
        unsafe { slot.write(value) };
        guard.initialized = i + 1;
    }
    core::mem::forget(guard);
}

/// Bitwise copy for `Copy` elements, serving both construct and assign
/// slots: overwriting a live `Copy` value needs no drop.
///
/// # Safety
///
/// See [`ValueVtable::clone_construct`]; additionally `T` must be the
/// table's element type.
unsafe fn copy_construct<T: Copy>(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    let src = src.cast::<T>().as_ptr();
    let dst = dst.cast::<T>().as_ptr();
    // SAFETY: Both spans cover `len` elements and do not overlap (caller).
    unsafe { ptr::copy_nonoverlapping(src, dst, len) };
}

/// Bitwise-moves `len` elements of `T` from `src` into `dst`.
///
/// # Safety
///
/// See [`ValueVtable::relocate`]; additionally `T` must be the table's
/// element type.
unsafe fn relocate<T>(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    let src = src.cast::<T>().as_ptr();
    let dst = dst.cast::<T>().as_ptr();
    // SAFETY: Both spans cover `len` elements and do not overlap (caller);
    // ownership of the bits transfers to `dst`.
    unsafe { ptr::copy_nonoverlapping(src, dst, len) };
}

/// Clone-assigns `len` elements of `T` from `src` onto `dst`.
///
/// Uses `clone_from`, which keeps the destination live even if it panics, so
/// no guard is needed.
///
/// # Safety
///
/// See [`ValueVtable::clone_assign`]; additionally `T` must be the table's
/// element type.
unsafe fn clone_assign<T: Clone>(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    let src = src.cast::<T>().as_ptr();
    let dst = dst.cast::<T>().as_ptr();
    for i in 0..len {
        // SAFETY: Both spans hold `len` live elements (caller) and `i < len`.
        let source = unsafe { src.add(i) };
        // SAFETY: As above.
        let slot = unsafe { dst.add(i) };
        // SAFETY: Live element, shared access only; the spans do not overlap.
        let s = unsafe { &*source };
        // SAFETY: Live element, exclusive access (caller); no overlap.
        let d = unsafe { &mut *slot };
        d.clone_from(s);
    }
}

/// Drops `len` live `T` in `dst`, then bitwise-moves `src` over them.
///
/// # Safety
///
/// See [`ValueVtable::move_assign`]; additionally `T` must be the table's
/// element type.
unsafe fn move_assign<T>(src: NonNull<u8>, dst: NonNull<u8>, len: usize) {
    // SAFETY: `dst` holds `len` live elements (caller).
    unsafe { drop_in::<T>(dst, len) };
    // SAFETY: `src` holds `len` live elements and the destination was just
    // vacated; non-overlap guaranteed by the caller.
    unsafe { relocate::<T>(src, dst, len) };
}

/// Drops `len` live `T` in `dst`.
///
/// # Safety
///
/// See [`ValueVtable::drop_in`]; additionally `T` must be the table's
/// element type.
unsafe fn drop_in<T>(dst: NonNull<u8>, len: usize) {
    let slice = ptr::slice_from_raw_parts_mut(dst.cast::<T>().as_ptr(), len);
    // SAFETY: `dst` points to `len` live elements (caller) which nobody will
    // use afterwards.
    unsafe { ptr::drop_in_place(slice) };
}

/// Swaps `len` live `T` between `a` and `b`.
///
/// # Safety
///
/// See [`ValueVtable::swap`]; additionally `T` must be the table's element
/// type.
unsafe fn swap<T>(a: NonNull<u8>, b: NonNull<u8>, len: usize) {
    let a = a.cast::<T>().as_ptr();
    let b = b.cast::<T>().as_ptr();
    for i in 0..len {
        // SAFETY: Both spans hold `len` live elements (caller) and `i < len`.
        let x = unsafe { a.add(i) };
        // SAFETY: As above.
        let y = unsafe { b.add(i) };
        // SAFETY: Both in bounds and live; the spans do not overlap, so the
        // elements are distinct.
        unsafe { ptr::swap(x, y) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    #[test]
    fn test_identity_is_the_type_not_the_table() {
        // Table addresses are not guaranteed unique across codegen units, so
        // identity goes through the recorded `TypeId`.
        let a = ValueVtable::cloneable::<i32>();
        let b = ValueVtable::cloneable::<i32>();
        assert_eq!(a.type_id(), b.type_id());
        assert_ne!(a.type_id(), ValueVtable::cloneable::<u32>().type_id());
    }

    #[test]
    fn test_recorded_identity() {
        let vt = ValueVtable::unique::<String>();
        assert_eq!(vt.type_id(), TypeId::of::<String>());
        assert!(vt.type_name().contains("String"));
        assert_eq!(vt.elem_layout(), Layout::new::<String>());
    }

    #[test]
    fn test_slot_shape_matches_descriptor() {
        let unique = ValueVtable::unique::<String>();
        assert!(!unique.lifetime().copy_construct.is_well_formed());
        assert!(unique.clone_construct.is_none());
        assert!(unique.clone_assign.is_none());
        assert!(unique.default_construct.is_none());

        let cloneable = ValueVtable::cloneable_defaultable::<String>();
        assert!(cloneable.lifetime().copy_construct.is_well_formed());
        assert!(cloneable.clone_construct.is_some());
        assert!(cloneable.clone_assign.is_some());
        assert!(cloneable.default_construct.is_some());

        let trivial = ValueVtable::trivial::<u64>();
        assert!(trivial.lifetime().copy_construct.is_noexcept());
        assert_eq!(trivial.lifetime(), trivial.lifetime().meet(LifetimeReq::trivial()));
    }
}
