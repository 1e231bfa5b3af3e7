//! The type-erased box state machine.
//!
//! A [`RawBox`] owns exactly one [`Allocation`], at most one
//! [`ValueAdaptor`], and an allocator instance. It implements the state
//! machine the safe crate exposes: `empty -> occupied` via the emplace
//! family, `occupied -> occupied` by destroying and (re)constructing,
//! `occupied -> empty` via [`RawBox::reset`] or drop.
//!
//! # Safety Invariant
//!
//! The fields are module-private and every mutation preserves:
//!
//! 1. If `adaptor` is `Some`, the allocation holds a live value of the
//!    adaptor's recorded type and shape, starting at the span's first byte,
//!    and `allocation.fits(adaptor.value_layout())`.
//! 2. A non-empty `allocation` was obtained from `alloc` (or an allocator
//!    interchangeable with it).

use core::{alloc::Layout, any::TypeId, mem, ptr, slice};

use alloc::alloc::handle_alloc_error;

use crate::{
    allocation::Allocation,
    allocator::{AllocError, Allocator},
    lifetime::LifetimeReq,
    value::{ValueAdaptor, ValueVtable},
};

/// A type-erased, allocator-aware single-value container.
///
/// This is the unsafe core; the `anybox` crate wraps it in a
/// policy-parameterized safe API.
pub struct RawBox<A: Allocator> {
    /// The owned span; empty when no capacity is held.
    allocation: Allocation,
    /// Dispatcher for the current value; `None` when the box is empty.
    adaptor: Option<ValueAdaptor>,
    /// The allocator every span in `allocation` comes from.
    alloc: A,
}

/// Allocates `layout` from `alloc` or diverges through
/// [`handle_alloc_error`], the convention for the non-`try` entry points.
fn alloc_or_die<A: Allocator>(alloc: &A, layout: Layout) -> Allocation {
    match Allocation::allocate(alloc, layout) {
        Ok(allocation) => allocation,
        Err(AllocError) => handle_alloc_error(layout),
    }
}

/// Drops the initialized prefix of a slice being filled if the element
/// producer panics.
struct PrefixGuard<T> {
    /// Start of the span being filled.
    ptr: *mut T,
    /// Elements fully written so far.
    initialized: usize,
}

impl<T> Drop for PrefixGuard<T> {
    fn drop(&mut self) {
        let prefix = ptr::slice_from_raw_parts_mut(self.ptr, self.initialized);
        // SAFETY: Exactly `initialized` elements were written before the
        // unwind, and the surrounding box has not recorded an adaptor yet,
        // so nothing else will drop them.
        unsafe { ptr::drop_in_place(prefix) };
    }
}

impl<A: Allocator> RawBox<A> {
    /// Creates an empty box that will allocate from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self { allocation: Allocation::EMPTY, adaptor: None, alloc }
    }

    /// The allocator this box draws from.
    #[inline]
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Whether a value is currently stored.
    #[inline]
    pub fn has_value(&self) -> bool {
        self.adaptor.is_some()
    }

    /// The adaptor of the current value, if any.
    #[inline]
    pub fn adaptor(&self) -> Option<&ValueAdaptor> {
        self.adaptor.as_ref()
    }

    /// Size of the stored value in bytes; zero when empty.
    #[inline]
    pub fn value_size(&self) -> usize {
        self.adaptor.map_or(0, |a| a.value_size())
    }

    /// Capacity of the owned span in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.allocation.size()
    }

    /// Whether the box holds a single value of type `T`.
    #[inline]
    pub fn is_type<T: 'static>(&self) -> bool {
        self.adaptor.is_some_and(|a| a.is_type::<T>())
    }

    /// Whether the box holds a slice with element type `T`.
    #[inline]
    pub fn is_slice_of<T: 'static>(&self) -> bool {
        self.adaptor.is_some_and(|a| a.is_slice_of::<T>())
    }

    /// Type name of the stored element type, if any.
    #[inline]
    pub fn type_name(&self) -> Option<&'static str> {
        self.adaptor.map(|a| a.type_name())
    }

    /// Lifetime descriptor of the stored value, if any.
    #[inline]
    pub fn lifetime(&self) -> Option<LifetimeReq> {
        self.adaptor.map(|a| a.lifetime())
    }

    /// Destroys the current value, keeping the capacity.
    pub fn reset(&mut self) {
        if let Some(adaptor) = self.adaptor.take() {
            // SAFETY: The box invariant says the allocation holds a live
            // value of the adaptor's type; taking the adaptor first means it
            // is destroyed exactly once.
            unsafe { adaptor.destroy(&self.allocation) };
        }
    }

    /// Makes the owned span fit `layout`, reallocating if necessary.
    ///
    /// Must only be called while the box is empty.
    fn ensure_capacity(&mut self, layout: Layout) -> Result<(), AllocError> {
        debug_assert!(self.adaptor.is_none(), "reallocating under a live value");
        if self.allocation.fits(layout) {
            return Ok(());
        }
        // SAFETY: The span came from `self.alloc` (invariant 2) and no value
        // lives in it.
        unsafe { self.allocation.deallocate(&self.alloc) };
        self.allocation = Allocation::allocate(&self.alloc, layout)?;
        Ok(())
    }

    /// Stores `value`, destroying any previous value and reallocating when
    /// the capacity does not fit.
    ///
    /// # Panics
    ///
    /// Panics if `vtable` was not created for `T`.
    pub fn try_emplace<T: 'static>(
        &mut self,
        value: T,
        vtable: &'static ValueVtable,
    ) -> Result<&mut T, AllocError> {
        assert_eq!(
            vtable.type_id(),
            TypeId::of::<T>(),
            "vtable does not describe {}",
            core::any::type_name::<T>(),
        );
        self.reset();
        self.ensure_capacity(Layout::new::<T>())?;
        // SAFETY: The span fits `T` and holds no live value.
        unsafe { self.allocation.data::<T>().write(value) };
        self.adaptor = Some(ValueAdaptor::new(vtable));
        // SAFETY: Just initialized; exclusive through `&mut self`.
        Ok(unsafe { self.allocation.get_mut::<T>() })
    }

    /// Builds the value in place through the vtable's default-construct
    /// dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if the vtable's descriptor marks default-construct ill-formed.
    pub fn try_emplace_default(&mut self, vtable: &'static ValueVtable) -> Result<(), AllocError> {
        self.reset();
        self.ensure_capacity(vtable.elem_layout())?;
        let adaptor = ValueAdaptor::new(vtable);
        // SAFETY: The span fits the value and holds no live value. If the
        // dispatcher panics, no adaptor has been recorded, so drop will not
        // double-destroy.
        unsafe { adaptor.default_construct(&self.allocation) };
        self.adaptor = Some(adaptor);
        Ok(())
    }

    /// Stores a slice of `len` elements produced by `f(index)`.
    ///
    /// Elements already produced are dropped if `f` panics partway.
    ///
    /// # Panics
    ///
    /// Panics if `vtable` was not created for `T`.
    pub fn try_emplace_slice_with<T: 'static>(
        &mut self,
        len: usize,
        mut f: impl FnMut(usize) -> T,
        vtable: &'static ValueVtable,
    ) -> Result<&mut [T], AllocError> {
        assert_eq!(
            vtable.type_id(),
            TypeId::of::<T>(),
            "vtable does not describe {}",
            core::any::type_name::<T>(),
        );
        self.reset();
        let layout = Layout::array::<T>(len).map_err(|_| AllocError)?;
        self.ensure_capacity(layout)?;

        // The retained span may be empty or under-aligned when no bytes are
        // needed; a dangling base keeps the returned slice well-aligned, as
        // in `get_slice`.
        let ptr = if len == 0 || mem::size_of::<T>() == 0 {
            ptr::NonNull::<T>::dangling()
        } else {
            self.allocation.as_ptr().cast::<T>()
        };
        let mut guard = PrefixGuard { ptr: ptr.as_ptr(), initialized: 0 };
        for i in 0..len {
            let value = f(i);
            // SAFETY: The span fits `len` elements and `i < len`.
            let slot = unsafe { ptr.as_ptr().add(i) };
            // SAFETY: In bounds as established above; no live element there.
            unsafe { slot.write(value) };
            guard.initialized = i + 1;
        }
        mem::forget(guard);

        self.adaptor = Some(ValueAdaptor::new_slice(vtable, len));
        // SAFETY: All `len` elements were initialized above; exclusive
        // through `&mut self`.
        Ok(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    /// Builds a slice of `len` default-constructed elements through the
    /// vtable's dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if the vtable's descriptor marks default-construct ill-formed.
    pub fn try_emplace_slice_default(
        &mut self,
        len: usize,
        vtable: &'static ValueVtable,
    ) -> Result<(), AllocError> {
        self.reset();
        let elem = vtable.elem_layout();
        let size = elem.size().checked_mul(len).ok_or(AllocError)?;
        let layout = Layout::from_size_align(size, elem.align()).map_err(|_| AllocError)?;
        self.ensure_capacity(layout)?;
        let adaptor = ValueAdaptor::new_slice(vtable, len);
        // SAFETY: The span fits `len` elements and holds no live value; no
        // adaptor is recorded until the dispatcher succeeds.
        unsafe { adaptor.default_construct(&self.allocation) };
        self.adaptor = Some(adaptor);
        Ok(())
    }

    /// Returns the stored value if it is a single `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        if !self.is_type::<T>() {
            return None;
        }
        // SAFETY: The adaptor records a live single `T` (box invariant);
        // shared access through `&self`.
        Some(unsafe { self.allocation.get::<T>() })
    }

    /// Mutable variant of [`get`](RawBox::get).
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.is_type::<T>() {
            return None;
        }
        // SAFETY: The adaptor records a live single `T` (box invariant);
        // exclusive access through `&mut self`.
        Some(unsafe { self.allocation.get_mut::<T>() })
    }

    /// Returns the stored value without checking the recorded type.
    ///
    /// # Safety
    ///
    /// The caller must ensure the box currently holds a single value of
    /// type `T`.
    pub unsafe fn get_unchecked<T: 'static>(&self) -> &T {
        debug_assert!(self.is_type::<T>());
        // SAFETY: The caller guarantees a live single `T`.
        unsafe { self.allocation.get::<T>() }
    }

    /// Mutable variant of [`get_unchecked`](RawBox::get_unchecked).
    ///
    /// # Safety
    ///
    /// Same as [`get_unchecked`](RawBox::get_unchecked).
    pub unsafe fn get_unchecked_mut<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.is_type::<T>());
        // SAFETY: The caller guarantees a live single `T`.
        unsafe { self.allocation.get_mut::<T>() }
    }

    /// Returns the stored slice if its element type is `T`.
    pub fn get_slice<T: 'static>(&self) -> Option<&[T]> {
        let adaptor = self.adaptor.filter(|a| a.is_slice_of::<T>())?;
        let len = adaptor.len();
        if len == 0 || mem::size_of::<T>() == 0 {
            // No bytes to point at; a dangling, well-aligned base suffices.
            let ptr = ptr::NonNull::<T>::dangling();
            // SAFETY: Zero-size slices are valid for any dangling aligned
            // base; for ZST elements every index is the same empty place.
            return Some(unsafe { slice::from_raw_parts(ptr.as_ptr(), len) });
        }
        let ptr = self.allocation.data::<T>();
        // SAFETY: The adaptor records `len` live elements of `T` (box
        // invariant); shared access through `&self`.
        Some(unsafe { slice::from_raw_parts(ptr.as_ptr(), len) })
    }

    /// Mutable variant of [`get_slice`](RawBox::get_slice).
    pub fn get_slice_mut<T: 'static>(&mut self) -> Option<&mut [T]> {
        let adaptor = self.adaptor.filter(|a| a.is_slice_of::<T>())?;
        let len = adaptor.len();
        if len == 0 || mem::size_of::<T>() == 0 {
            let ptr = ptr::NonNull::<T>::dangling();
            // SAFETY: As in `get_slice`; exclusivity through `&mut self`.
            return Some(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) });
        }
        let ptr = self.allocation.data::<T>();
        // SAFETY: The adaptor records `len` live elements of `T` (box
        // invariant); exclusive access through `&mut self`.
        Some(unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), len) })
    }

    /// Moves the stored value out if it is a single `T`, leaving the box
    /// empty (capacity retained).
    pub fn take<T: 'static>(&mut self) -> Option<T> {
        if !self.is_type::<T>() {
            return None;
        }
        self.adaptor = None;
        // SAFETY: The adaptor recorded a live single `T` and was cleared
        // above, so ownership of the value transfers to the read.
        Some(unsafe { self.allocation.data::<T>().read() })
    }

    /// Clone-assigns the value of `other` into `self`, following the
    /// adaptor-equality branch: equal adaptors reuse the allocation and
    /// assign in place, unequal adaptors destroy, reallocate if needed, and
    /// clone-construct.
    ///
    /// # Panics
    ///
    /// Panics if `other` holds a value whose descriptor marks the required
    /// copy operation ill-formed.
    pub fn try_clone_value_from(&mut self, other: &Self) -> Result<(), AllocError> {
        let Some(src) = other.adaptor else {
            self.reset();
            return Ok(());
        };
        if self.adaptor == other.adaptor {
            // SAFETY: Both boxes hold live values of `src`'s type and shape;
            // distinct boxes, so the spans are disjoint.
            unsafe { src.clone_assign(&other.allocation, &self.allocation) };
            return Ok(());
        }
        self.reset();
        self.ensure_capacity(src.value_layout())?;
        // SAFETY: `other` holds a live value of `src`'s type; `self`'s span
        // fits it, is vacant, and is disjoint from `other`'s.
        unsafe { src.clone_construct(&other.allocation, &self.allocation) };
        self.adaptor = Some(src);
        Ok(())
    }

    /// Moves this box onto another allocator instance.
    ///
    /// When the allocators are interchangeable this steals the span and the
    /// adaptor without touching the value. Otherwise the value is relocated
    /// bitwise into a fresh span from `alloc` — still a move, never a clone.
    pub fn transfer(mut self, alloc: A) -> Self {
        if alloc.is_interchangeable(&self.alloc) {
            let allocation = mem::replace(&mut self.allocation, Allocation::EMPTY);
            let adaptor = self.adaptor.take();
            // `self` now owns nothing; its drop is a no-op apart from the
            // old allocator.
            return Self { allocation, adaptor, alloc };
        }
        let mut out = Self::new_in(alloc);
        if let Some(adaptor) = self.adaptor.take() {
            out.allocation = alloc_or_die(&out.alloc, adaptor.value_layout());
            // SAFETY: The value is still live in `self.allocation` (the
            // adaptor was only detached); the fresh span fits, is vacant and
            // disjoint. `self` no longer has an adaptor, so it will not
            // destroy the moved-out bits.
            unsafe { adaptor.relocate(&self.allocation, &out.allocation) };
            out.adaptor = Some(adaptor);
        }
        out
    }

    /// Exchanges the values of two boxes.
    ///
    /// Interchangeable allocators swap the spans in O(1). Otherwise equal
    /// adaptors swap element-wise in place, and differing adaptors relocate
    /// both values through fresh spans from the opposite allocators.
    pub fn swap_with(&mut self, other: &mut Self) {
        if self.alloc.is_interchangeable(&other.alloc) {
            mem::swap(&mut self.allocation, &mut other.allocation);
            mem::swap(&mut self.adaptor, &mut other.adaptor);
            return;
        }
        if let (Some(a), Some(b)) = (self.adaptor, other.adaptor)
            && a == b
        {
            // SAFETY: Both boxes hold live values of the same type and
            // shape; distinct boxes, so the spans are disjoint.
            unsafe { a.swap(&self.allocation, &other.allocation) };
            return;
        }

        let here = self.adaptor.take();
        let there = other.adaptor.take();
        // Allocate both destinations before moving anything, so an
        // allocation failure aborts with both values still intact.
        let new_self = match there {
            Some(adaptor) => alloc_or_die(&self.alloc, adaptor.value_layout()),
            None => Allocation::EMPTY,
        };
        let new_other = match here {
            Some(adaptor) => alloc_or_die(&other.alloc, adaptor.value_layout()),
            None => Allocation::EMPTY,
        };
        if let Some(adaptor) = here {
            // SAFETY: The value is live in `self.allocation`; the fresh span
            // fits, is vacant and disjoint, and no adaptor remains to
            // double-destroy the source bits.
            unsafe { adaptor.relocate(&self.allocation, &new_other) };
        }
        if let Some(adaptor) = there {
            // SAFETY: As above, for `other`.
            unsafe { adaptor.relocate(&other.allocation, &new_self) };
        }
        // SAFETY: The old spans came from their respective allocators and no
        // live value remains in either.
        unsafe { self.allocation.deallocate(&self.alloc) };
        // SAFETY: As above.
        unsafe { other.allocation.deallocate(&other.alloc) };
        self.allocation = new_self;
        self.adaptor = there;
        other.allocation = new_other;
        other.adaptor = here;
    }
}

impl<A: Allocator> Drop for RawBox<A> {
    fn drop(&mut self) {
        self.reset();
        // SAFETY: The span came from `self.alloc` (box invariant) and
        // `reset` destroyed any live value.
        unsafe { self.allocation.deallocate(&self.alloc) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::Global;
    use alloc::{string::String, vec::Vec};

    #[test]
    fn test_empty_box() {
        let b = RawBox::new_in(Global);
        assert!(!b.has_value());
        assert_eq!(b.value_size(), 0);
        assert_eq!(b.capacity(), 0);
        assert!(b.get::<u32>().is_none());
        assert!(b.type_name().is_none());
    }

    #[test]
    fn test_emplace_get_take() {
        let mut b = RawBox::new_in(Global);
        let vt = ValueVtable::cloneable::<String>();

        *b.try_emplace(String::from("hello"), vt).unwrap() += " world";
        assert!(b.has_value());
        assert!(b.is_type::<String>());
        assert!(!b.is_type::<u32>());
        assert_eq!(b.get::<String>().unwrap(), "hello world");
        assert!(b.get::<u32>().is_none());
        assert_eq!(b.value_size(), mem::size_of::<String>());

        let s = b.take::<String>().unwrap();
        assert_eq!(s, "hello world");
        assert!(!b.has_value());
        // Capacity survives a take.
        assert!(b.capacity() >= mem::size_of::<String>());
    }

    #[test]
    fn test_emplace_reuses_capacity() {
        let mut b = RawBox::new_in(Global);
        b.try_emplace(0u64, ValueVtable::trivial::<u64>()).unwrap();
        let cap = b.capacity();
        b.try_emplace(1u8, ValueVtable::trivial::<u8>()).unwrap();
        assert_eq!(b.capacity(), cap, "smaller value must reuse the span");
        assert!(b.is_type::<u8>());
    }

    #[test]
    fn test_emplace_replaces_other_type() {
        let mut b = RawBox::new_in(Global);
        b.try_emplace(String::from("gone"), ValueVtable::cloneable::<String>()).unwrap();
        b.try_emplace(7u32, ValueVtable::trivial::<u32>()).unwrap();
        assert!(b.is_type::<u32>());
        assert!(!b.is_type::<String>());
        assert_eq!(*b.get::<u32>().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "vtable does not describe")]
    fn test_mismatched_vtable_panics() {
        let mut b = RawBox::new_in(Global);
        let _ = b.try_emplace(1u32, ValueVtable::trivial::<u64>());
    }

    #[test]
    fn test_zero_sized_value() {
        #[derive(PartialEq, Debug)]
        struct Marker;
        let mut b = RawBox::new_in(Global);
        b.try_emplace(Marker, ValueVtable::unique::<Marker>()).unwrap();
        assert!(b.has_value());
        assert_eq!(b.value_size(), 0);
        assert_eq!(b.capacity(), 0, "zero-size values never touch the allocator");
        assert_eq!(b.take::<Marker>(), Some(Marker));
    }

    #[test]
    fn test_slice_emplace_and_access() {
        let mut b = RawBox::new_in(Global);
        let vt = ValueVtable::cloneable::<u32>();
        let written = b.try_emplace_slice_with(4, |i| i as u32 * 10, vt).unwrap();
        assert_eq!(written, &[0, 10, 20, 30]);
        assert!(b.is_slice_of::<u32>());
        assert!(!b.is_type::<u32>());
        assert_eq!(b.value_size(), 16);
        b.get_slice_mut::<u32>().unwrap()[0] = 5;
        assert_eq!(b.get_slice::<u32>().unwrap(), &[5, 10, 20, 30]);
        assert!(b.get_slice::<i32>().is_none());
    }

    #[test]
    fn test_empty_slice_of_sized_type() {
        let mut b = RawBox::new_in(Global);
        let vt = ValueVtable::cloneable::<u64>();
        let written = b.try_emplace_slice_with(0, |_| 0u64, vt).unwrap();
        assert!(written.is_empty());
        assert!(b.is_slice_of::<u64>());
        assert_eq!(b.get_slice::<u64>().unwrap(), &[]);

        // A retained span with alignment below the element's must not leak
        // into the empty slice.
        b.try_emplace(3u8, ValueVtable::trivial::<u8>()).unwrap();
        b.try_emplace_slice_with(0, |_| 0u64, vt).unwrap();
        assert!(b.get_slice::<u64>().unwrap().is_empty());
        assert_eq!(b.value_size(), 0);
    }

    #[test]
    fn test_slice_default_dispatch() {
        let mut b = RawBox::new_in(Global);
        let vt = ValueVtable::cloneable_defaultable::<Vec<u8>>();
        b.try_emplace_slice_default(3, vt).unwrap();
        let slices = b.get_slice::<Vec<u8>>().unwrap();
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_clone_value_from_branches() {
        let vt = ValueVtable::cloneable::<String>();
        let mut a = RawBox::new_in(Global);
        let mut b = RawBox::new_in(Global);
        a.try_emplace(String::from("source"), vt).unwrap();

        // Different adaptors: construct path.
        b.try_clone_value_from(&a).unwrap();
        assert_eq!(b.get::<String>().unwrap(), "source");

        // Equal adaptors: assign path, allocation reused.
        a.get_mut::<String>().unwrap().push_str(" v2");
        let cap = b.capacity();
        b.try_clone_value_from(&a).unwrap();
        assert_eq!(b.get::<String>().unwrap(), "source v2");
        assert_eq!(b.capacity(), cap);

        // Cloning from an empty box empties the destination.
        let empty = RawBox::new_in(Global);
        b.try_clone_value_from(&empty).unwrap();
        assert!(!b.has_value());
    }

    #[test]
    fn test_transfer_interchangeable_steals() {
        let mut a = RawBox::new_in(Global);
        a.try_emplace(String::from("moved"), ValueVtable::cloneable::<String>()).unwrap();
        let before = a.allocation.as_ptr();
        let b = a.transfer(Global);
        assert_eq!(b.allocation.as_ptr(), before, "interchangeable transfer must steal");
        assert_eq!(b.get::<String>().unwrap(), "moved");
    }

    #[test]
    fn test_swap_with_interchangeable() {
        let mut a = RawBox::new_in(Global);
        let mut b = RawBox::new_in(Global);
        a.try_emplace(1u32, ValueVtable::trivial::<u32>()).unwrap();
        b.try_emplace(String::from("two"), ValueVtable::cloneable::<String>()).unwrap();
        a.swap_with(&mut b);
        assert_eq!(a.get::<String>().unwrap(), "two");
        assert_eq!(*b.get::<u32>().unwrap(), 1);
    }
}
