//! The allocator capability used by every other module in this crate.
//!
//! This is a stable re-expression of the unstable [`core::alloc::Allocator`]
//! trait, narrowed to the operations the box machinery needs: fallible
//! allocation, layout-paired deallocation, and an interchangeability contract
//! that tells the container when memory obtained from one allocator instance
//! may be released through another.

use core::{
    alloc::Layout,
    fmt,
    ptr::{self, NonNull},
};

use alloc::alloc as heap;

/// The error returned when an allocator cannot satisfy a request.
///
/// Carries no payload: the failed [`Layout`] is always available at the call
/// site, and keeping the type zero-sized keeps `Result<NonNull<u8>,
/// AllocError>` pointer-sized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// A source of raw memory.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. A pointer returned by [`allocate`] is valid for reads and writes of
///    `layout.size()` bytes, is aligned to `layout.align()`, and stays valid
///    until it is passed to [`deallocate`] on this instance or on an instance
///    for which [`is_interchangeable`] returns `true`.
/// 2. If [`is_interchangeable`] returns `true` for a pair of instances (or
///    [`ALWAYS_EQUAL`] is `true`), memory allocated through either instance
///    may be deallocated through the other.
/// 3. Cloning or moving an allocator must not invalidate memory it has
///    handed out; a clone is interchangeable with its source.
///
/// [`allocate`]: Allocator::allocate
/// [`deallocate`]: Allocator::deallocate
/// [`is_interchangeable`]: Allocator::is_interchangeable
/// [`ALWAYS_EQUAL`]: Allocator::ALWAYS_EQUAL
pub unsafe trait Allocator {
    /// Whether any two instances of this allocator are interchangeable.
    ///
    /// Stateless allocators such as [`Global`] set this to `true`, which lets
    /// the container move allocations between instances without copying.
    const ALWAYS_EQUAL: bool;

    /// Attempts to allocate a block of memory fitting `layout`.
    ///
    /// Zero-size layouts are permitted; implementations must return a
    /// non-null, aligned (possibly dangling) pointer for them rather than
    /// failing.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Deallocates the block at `ptr`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` denotes a block currently allocated by this allocator (or an
    ///    interchangeable one).
    /// 2. `layout` is the same layout that was used to allocate the block.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Returns whether memory allocated by `other` may be released by `self`
    /// and vice versa.
    fn is_interchangeable(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        let _ = other;
        Self::ALWAYS_EQUAL
    }
}

/// Returns a well-aligned dangling pointer for a zero-size block.
pub(crate) fn dangling_for(layout: Layout) -> NonNull<u8> {
    let ptr = ptr::without_provenance_mut::<u8>(layout.align());
    // SAFETY: `Layout` guarantees a nonzero, power-of-two alignment, so the
    // address cannot be zero.
    unsafe { NonNull::new_unchecked(ptr) }
}

/// The global-heap allocator.
///
/// All instances are interchangeable. Zero-size requests are served with an
/// aligned dangling pointer without touching the heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

// SAFETY: `alloc::alloc` hands out blocks valid until the matching `dealloc`,
// and the global heap is a single shared resource, so every instance is
// interchangeable with every other.
unsafe impl Allocator for Global {
    const ALWAYS_EQUAL: bool = true;

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            return Ok(dangling_for(layout));
        }
        // SAFETY: `layout` has nonzero size, as required by `alloc`.
        let ptr = unsafe { heap::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: The caller guarantees `ptr` came from `alloc` with this
        // exact `layout`, and zero-size (never-allocated) blocks are filtered
        // out above.
        unsafe { heap::dealloc(ptr.as_ptr(), layout) };
    }
}

// SAFETY: Forwarding every operation to `A` preserves all of `A`'s
// guarantees; a reference and its referent are trivially interchangeable.
unsafe impl<A: Allocator> Allocator for &A {
    const ALWAYS_EQUAL: bool = A::ALWAYS_EQUAL;

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Contract forwarded verbatim from the caller.
        unsafe { (**self).deallocate(ptr, layout) };
    }

    fn is_interchangeable(&self, other: &Self) -> bool {
        (**self).is_interchangeable(other)
    }
}
