//! The raw memory span handle.
//!
//! An [`Allocation`] describes a region obtained from an [`Allocator`]: a
//! pointer plus the [`Layout`] it was allocated with. It owns the span (until
//! [`Allocation::deallocate`]) but knows nothing about the lifetime of any
//! object constructed inside it — that bookkeeping belongs to the value
//! adaptor and the box.
//!
//! The handle is `Copy`, like the subrange it models: copying it duplicates
//! the description of the span, not the span itself. Exactly one copy must be
//! passed to [`Allocation::deallocate`], which is the responsibility of the
//! owning container.

use core::{alloc::Layout, ptr::NonNull};

use crate::allocator::{AllocError, Allocator};

/// A pointer+layout handle to a raw memory span.
///
/// The spec-level `{begin pointer, size}` pair carries the full [`Layout`]
/// here, because deallocation in Rust requires the layout the block was
/// allocated with, alignment included.
#[derive(Clone, Copy, Debug)]
pub struct Allocation {
    /// Start of the span.
    ///
    /// # Safety
    ///
    /// When `layout.size() != 0`, this points to a live block of
    /// `layout.size()` bytes, aligned to `layout.align()`, obtained from the
    /// allocator the handle was created with. When `layout.size() == 0`, the
    /// pointer is dangling and no block exists.
    ptr: NonNull<u8>,
    /// The layout the span was allocated with; `size() == 0` means empty.
    layout: Layout,
}

impl Allocation {
    /// The empty allocation: dangling pointer, zero size.
    pub const EMPTY: Self = Self {
        ptr: NonNull::dangling(),
        layout: Layout::new::<()>(),
    };

    /// Requests a span fitting `layout` from `alloc`.
    ///
    /// Zero-size layouts yield [`Allocation::EMPTY`] without consulting the
    /// allocator, so an empty box never holds heap memory.
    pub fn allocate<A: Allocator>(alloc: &A, layout: Layout) -> Result<Self, AllocError> {
        if layout.size() == 0 {
            return Ok(Self::EMPTY);
        }
        let ptr = alloc.allocate(layout)?;
        Ok(Self { ptr, layout })
    }

    /// Non-failing variant of [`allocate`]: returns [`Allocation::EMPTY`]
    /// when the allocator cannot satisfy the request.
    ///
    /// [`allocate`]: Allocation::allocate
    pub fn try_allocate<A: Allocator>(alloc: &A, layout: Layout) -> Self {
        Self::allocate(alloc, layout).unwrap_or(Self::EMPTY)
    }

    /// Releases the span and resets the handle to empty.
    ///
    /// Calling this on an already-empty allocation is a no-op.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. A non-empty span was allocated through `alloc` or an allocator
    ///    interchangeable with it.
    /// 2. No other copy of this handle is used to access or release the span
    ///    afterwards.
    /// 3. No live object remains inside the span.
    pub unsafe fn deallocate<A: Allocator>(&mut self, alloc: &A) {
        if self.is_empty() {
            return;
        }
        // SAFETY: The span is live (handle invariant) and `alloc` may release
        // it (guaranteed by the caller); `self.layout` is the allocating
        // layout by the handle invariant.
        unsafe { alloc.deallocate(self.ptr, self.layout) };
        *self = Self::EMPTY;
    }

    /// Size of the span in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Alignment the span was allocated with.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Whether the handle describes no memory.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Whether a value of `layout` fits in the span, size and alignment both.
    #[inline]
    pub fn fits(&self, layout: Layout) -> bool {
        if layout.size() == 0 {
            return true;
        }
        self.size() >= layout.size() && self.align() >= layout.align()
    }

    /// Start of the span as a byte pointer.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Reinterprets the span as a `T` pointer.
    ///
    /// Size and alignment sufficiency is a `debug_assert!`ed precondition: a
    /// violation is a programming bug in the caller, not a runtime condition.
    /// Zero-sized `T` is always served with a dangling pointer.
    #[inline]
    pub fn data<T>(&self) -> NonNull<T> {
        let layout = Layout::new::<T>();
        if layout.size() == 0 {
            return NonNull::dangling();
        }
        debug_assert!(self.fits(layout), "allocation too small for {}", core::any::type_name::<T>());
        self.ptr.cast::<T>()
    }

    /// Reinterprets the span as a reference to a live `T`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The span currently holds an initialized `T` at its start.
    /// 2. The span fits `Layout::new::<T>()`.
    /// 3. The aliasing rules for `&T` are respected for the returned borrow.
    #[inline]
    pub unsafe fn get<T>(&self) -> &T {
        let ptr = self.data::<T>();
        // SAFETY: Initialization, fit, and aliasing guaranteed by the caller.
        unsafe { ptr.as_ref() }
    }

    /// Mutable variant of [`get`](Allocation::get).
    ///
    /// # Safety
    ///
    /// Same as [`get`](Allocation::get), with exclusive access for the
    /// returned borrow.
    #[inline]
    pub unsafe fn get_mut<T>(&mut self) -> &mut T {
        let mut ptr = self.data::<T>();
        // SAFETY: Initialization, fit, and exclusivity guaranteed by the
        // caller.
        unsafe { ptr.as_mut() }
    }
}

impl Default for Allocation {
    fn default() -> Self {
        Self::EMPTY
    }
}
