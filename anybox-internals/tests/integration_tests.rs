//! Integration tests for the anybox-internals crate functionality.
//!
//! This suite drives the whole stack — allocator, allocation, vtable,
//! adaptor, raw box — through the scenarios the safe crate relies on:
//!
//! ## Allocator accounting (3 tests)
//! - `test_value_lifecycle_balances_allocator`: Every allocation made over a
//!   box's lifetime is returned by the time it drops
//! - `test_emplace_reuse_does_not_reallocate`: Re-emplacing a value that fits
//!   the existing capacity performs no allocator round trip
//! - `test_assign_reuses_capacity_for_equal_adaptors`: Clone-assign between
//!   boxes of the same type goes through the in-place path
//!
//! ## Element lifecycle (3 tests)
//! - `test_slice_elements_drop_exactly_once`: Slice teardown drops each
//!   element exactly once, whether through reset, re-emplace, or box drop
//! - `test_transfer_moves_without_cloning`: Moving a box to another allocator
//!   never invokes the element's `Clone`
//! - `test_clone_value_from_clones_each_element`: Cloning a slice-holding box
//!   clones every element
//!
//! ## Allocator interchange (2 tests)
//! - `test_transfer_between_regions_relocates`: Transfer between
//!   non-interchangeable allocators frees the old span and fills a new one
//! - `test_swap_between_regions`: Swap between non-interchangeable allocators
//!   with differing value types relocates both values
//!
//! ## Layout guarantees (1 test)
//! - `test_type_properties`: Size and auto-trait expectations that the safe
//!   crate depends on

use core::{alloc::Layout, ptr::NonNull};
use std::{
    cell::Cell,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

use anybox_internals::{AllocError, Allocation, Allocator, Global, RawBox, ValueVtable};
use static_assertions::{assert_impl_all, assert_not_impl_any};

/// A global-heap allocator that counts its traffic.
#[derive(Clone, Default)]
struct Counting {
    allocations: Rc<Cell<usize>>,
    deallocations: Rc<Cell<usize>>,
}

unsafe impl Allocator for Counting {
    const ALWAYS_EQUAL: bool = true;

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        self.allocations.set(self.allocations.get() + 1);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.deallocations.set(self.deallocations.get() + 1);
        unsafe { Global.deallocate(ptr, layout) };
    }
}

/// A global-heap allocator that only trusts allocators from the same region.
#[derive(Clone)]
struct Region {
    id: usize,
}

unsafe impl Allocator for Region {
    const ALWAYS_EQUAL: bool = false;

    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { Global.deallocate(ptr, layout) };
    }

    fn is_interchangeable(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[test]
fn test_value_lifecycle_balances_allocator() {
    let counting = Counting::default();
    {
        let mut b = RawBox::new_in(counting.clone());
        b.try_emplace(String::from("first"), ValueVtable::cloneable::<String>())
            .unwrap();
        b.try_emplace(vec![1u64, 2, 3], ValueVtable::cloneable::<Vec<u64>>())
            .unwrap();
        b.reset();
        b.try_emplace(42u128, ValueVtable::trivial::<u128>()).unwrap();
    }
    assert!(counting.allocations.get() > 0);
    assert_eq!(
        counting.allocations.get(),
        counting.deallocations.get(),
        "every span must be returned by drop"
    );
}

#[test]
fn test_emplace_reuse_does_not_reallocate() {
    let counting = Counting::default();
    let mut b = RawBox::new_in(counting.clone());
    b.try_emplace([0u64; 4], ValueVtable::trivial::<[u64; 4]>()).unwrap();
    assert_eq!(counting.allocations.get(), 1);

    // Same size: reuse.
    b.try_emplace([1u64; 4], ValueVtable::trivial::<[u64; 4]>()).unwrap();
    // Smaller: reuse.
    b.try_emplace(7u8, ValueVtable::trivial::<u8>()).unwrap();
    assert_eq!(counting.allocations.get(), 1, "fitting values must reuse the span");

    // Larger: one more round trip.
    b.try_emplace([2u64; 8], ValueVtable::trivial::<[u64; 8]>()).unwrap();
    assert_eq!(counting.allocations.get(), 2);
    assert_eq!(counting.deallocations.get(), 1);
}

#[test]
fn test_assign_reuses_capacity_for_equal_adaptors() {
    let counting = Counting::default();
    let mut src = RawBox::new_in(counting.clone());
    let mut dst = RawBox::new_in(counting.clone());
    let vt = ValueVtable::cloneable::<String>();

    src.try_emplace(String::from("one"), vt).unwrap();
    dst.try_emplace(String::from("two"), vt).unwrap();
    let after_emplace = counting.allocations.get();

    dst.try_clone_value_from(&src).unwrap();
    assert_eq!(dst.get::<String>().unwrap(), "one");
    // The box itself must not have reallocated; the String's own buffer is
    // not drawn from `counting`.
    assert_eq!(counting.allocations.get(), after_emplace);
}

#[test]
fn test_slice_elements_drop_exactly_once() {
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Clone)]
    struct Tracked(#[allow(dead_code)] usize);
    impl Drop for Tracked {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::Relaxed);
        }
    }

    let vt = ValueVtable::cloneable::<Tracked>();
    let mut b = RawBox::new_in(Global);
    b.try_emplace_slice_with(5, Tracked, vt).unwrap();
    assert_eq!(DROPS.load(Ordering::Relaxed), 0);

    b.reset();
    assert_eq!(DROPS.load(Ordering::Relaxed), 5);

    b.try_emplace_slice_with(3, Tracked, vt).unwrap();
    drop(b);
    assert_eq!(DROPS.load(Ordering::Relaxed), 8);
}

#[test]
fn test_transfer_moves_without_cloning() {
    static CLONES: AtomicUsize = AtomicUsize::new(0);

    struct CloneLoud(u32);
    impl Clone for CloneLoud {
        fn clone(&self) -> Self {
            CLONES.fetch_add(1, Ordering::Relaxed);
            CloneLoud(self.0)
        }
    }

    let mut b = RawBox::new_in(Region { id: 1 });
    b.try_emplace(CloneLoud(99), ValueVtable::cloneable::<CloneLoud>())
        .unwrap();

    // Different region: the span is reallocated but the value is relocated
    // bitwise, never cloned.
    let moved = b.transfer(Region { id: 2 });
    assert_eq!(moved.get::<CloneLoud>().unwrap().0, 99);
    assert_eq!(CLONES.load(Ordering::Relaxed), 0);

    // Same region: the span itself is stolen.
    let stolen = moved.transfer(Region { id: 2 });
    assert_eq!(stolen.get::<CloneLoud>().unwrap().0, 99);
    assert_eq!(CLONES.load(Ordering::Relaxed), 0);
}

#[test]
fn test_clone_value_from_clones_each_element() {
    static CLONES: AtomicUsize = AtomicUsize::new(0);

    struct Elem(u32);
    impl Clone for Elem {
        fn clone(&self) -> Self {
            CLONES.fetch_add(1, Ordering::Relaxed);
            Elem(self.0)
        }
    }

    let vt = ValueVtable::cloneable::<Elem>();
    let mut src = RawBox::new_in(Global);
    src.try_emplace_slice_with(4, |i| Elem(i as u32), vt).unwrap();

    let mut dst = RawBox::new_in(Global);
    dst.try_clone_value_from(&src).unwrap();
    assert_eq!(CLONES.load(Ordering::Relaxed), 4);

    let cloned: Vec<u32> = dst.get_slice::<Elem>().unwrap().iter().map(|e| e.0).collect();
    assert_eq!(cloned, [0, 1, 2, 3]);
}

#[test]
fn test_transfer_between_regions_relocates() {
    let counting = Counting::default();

    // Wrap the counting allocator so the two boxes refuse to exchange spans.
    #[derive(Clone)]
    struct CountingRegion {
        id: usize,
        inner: Counting,
    }
    unsafe impl Allocator for CountingRegion {
        const ALWAYS_EQUAL: bool = false;

        fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
            self.inner.allocate(layout)
        }

        unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
            unsafe { self.inner.deallocate(ptr, layout) };
        }

        fn is_interchangeable(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    let mut b = RawBox::new_in(CountingRegion { id: 1, inner: counting.clone() });
    b.try_emplace(String::from("relocated"), ValueVtable::cloneable::<String>())
        .unwrap();
    assert_eq!(counting.allocations.get(), 1);

    let moved = b.transfer(CountingRegion { id: 2, inner: counting.clone() });
    assert_eq!(moved.get::<String>().unwrap(), "relocated");
    // One new span for the destination, the old one returned.
    assert_eq!(counting.allocations.get(), 2);
    assert_eq!(counting.deallocations.get(), 1);

    drop(moved);
    assert_eq!(counting.deallocations.get(), 2);
}

#[test]
fn test_swap_between_regions() {
    let mut a = RawBox::new_in(Region { id: 1 });
    let mut b = RawBox::new_in(Region { id: 2 });
    a.try_emplace(String::from("text"), ValueVtable::cloneable::<String>())
        .unwrap();
    b.try_emplace(vec![1u8, 2, 3], ValueVtable::cloneable::<Vec<u8>>())
        .unwrap();

    a.swap_with(&mut b);
    assert_eq!(a.get::<Vec<u8>>().unwrap(), &[1, 2, 3]);
    assert_eq!(b.get::<String>().unwrap(), "text");

    // Swapping with an empty box across regions drains into it.
    let mut empty = RawBox::new_in(Region { id: 3 });
    a.swap_with(&mut empty);
    assert!(!a.has_value());
    assert_eq!(empty.get::<Vec<u8>>().unwrap(), &[1, 2, 3]);
}

#[test]
fn test_type_properties() {
    assert_impl_all!(Allocation: Copy, core::fmt::Debug);
    assert_impl_all!(Global: Copy, Default);
    assert_eq!(core::mem::size_of::<AllocError>(), 0);

    // The raw pointer inside keeps the box firmly single-threaded; the safe
    // crate decides where to add Send/Sync on top.
    assert_not_impl_any!(RawBox<Global>: Send, Sync);
    assert_not_impl_any!(Allocation: Send, Sync);
}
