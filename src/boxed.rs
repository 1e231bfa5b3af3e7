//! The safe, policy-parameterized box.

use core::{alloc::Layout, fmt, marker::PhantomData};

use alloc::alloc::handle_alloc_error;
use anybox_internals::{AllocError, Allocator, Global, LifetimeReq, RawBox};

use crate::markers::{Boxable, CloneablePolicy, DefaultBoxable, LifetimePolicy};

/// An allocator-aware container for a single value (or slice) of any
/// `'static` type, with the type erased at runtime.
///
/// The policy parameter `P` selects the lifetime policy (see
/// [`markers`](crate::markers)): it decides which values can be stored and
/// whether the box implements `Clone`. The allocator parameter `A` defaults
/// to the global heap.
///
/// A box owns at most one value at a time, plus a span of raw capacity that
/// survives [`take`](AnyBox::take) and [`reset`](AnyBox::reset) and is reused
/// by later emplacements that fit it.
///
/// # Examples
///
/// ```
/// use anybox::NormalBox;
///
/// let mut b: NormalBox = NormalBox::new();
/// b.emplace(vec![1u32, 2, 3]);
/// assert!(b.is_type::<Vec<u32>>());
///
/// b.get_mut::<Vec<u32>>().unwrap().push(4);
/// assert_eq!(b.take::<Vec<u32>>(), Some(vec![1, 2, 3, 4]));
/// assert!(!b.has_value());
/// ```
pub struct AnyBox<P: LifetimePolicy, A: Allocator = Global> {
    /// The type-erased core.
    raw: RawBox<A>,
    /// The policy is a compile-time instruction set; nothing is stored.
    _policy: PhantomData<P>,
}

/// Diverges through [`handle_alloc_error`] with the layout that could not be
/// satisfied, like `Box` and `Vec` do on allocation failure.
fn emplace_failed(layout: Layout) -> ! {
    handle_alloc_error(layout)
}

impl<P: LifetimePolicy, A: Allocator> AnyBox<P, A> {
    /// Creates an empty box drawing from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self { raw: RawBox::new_in(alloc), _policy: PhantomData }
    }

    /// The allocator this box draws from.
    pub fn allocator(&self) -> &A {
        self.raw.allocator()
    }

    /// Whether a value is currently stored.
    ///
    /// Zero-sized values count: a box holding `()` has a value even though
    /// it occupies no memory.
    pub fn has_value(&self) -> bool {
        self.raw.has_value()
    }

    /// Whether the box holds a single value of type `T`.
    pub fn is_type<T: 'static>(&self) -> bool {
        self.raw.is_type::<T>()
    }

    /// Whether the box holds a slice with element type `T`.
    pub fn is_slice_of<T: 'static>(&self) -> bool {
        self.raw.is_slice_of::<T>()
    }

    /// Size in bytes of the stored value; zero when empty.
    pub fn value_size(&self) -> usize {
        self.raw.value_size()
    }

    /// Capacity in bytes of the owned span.
    ///
    /// Capacity can exceed [`value_size`](AnyBox::value_size) when a smaller
    /// value was emplaced into a larger retained span.
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// The `type_name` of the stored element type, if any.
    ///
    /// Best-effort diagnostics only; the string is not a stable identifier.
    pub fn type_name(&self) -> Option<&'static str> {
        self.raw.type_name()
    }

    /// The lifetime descriptor recorded for the stored value, if any.
    ///
    /// Always dominated by `P`'s ceiling.
    pub fn lifetime(&self) -> Option<LifetimeReq> {
        self.raw.lifetime()
    }

    /// Stores `value`, dropping any previous value. The retained span is
    /// reused when the new value fits it.
    ///
    /// Returns a reference to the stored value. On allocation failure this
    /// calls [`handle_alloc_error`]; use [`try_emplace`](AnyBox::try_emplace)
    /// to handle failure instead.
    pub fn emplace<T: Boxable<P>>(&mut self, value: T) -> &mut T {
        match self.raw.try_emplace(value, T::vtable()) {
            Ok(stored) => stored,
            Err(AllocError) => emplace_failed(Layout::new::<T>()),
        }
    }

    /// Fallible variant of [`emplace`](AnyBox::emplace).
    pub fn try_emplace<T: Boxable<P>>(&mut self, value: T) -> Result<&mut T, AllocError> {
        self.raw.try_emplace(value, T::vtable())
    }

    /// Stores `T::default()`, constructed directly in the box's span.
    ///
    /// The vtable recorded by this method carries the default-construct
    /// dispatcher, so a later [`clone`](Clone::clone) of the box keeps full
    /// knowledge of the value's operations.
    pub fn emplace_default<T: DefaultBoxable<P>>(&mut self) -> &mut T {
        if self.raw.try_emplace_default(T::vtable_with_default()).is_err() {
            emplace_failed(Layout::new::<T>());
        }
        self.expect_value::<T>()
    }

    /// Fallible variant of [`emplace_default`](AnyBox::emplace_default).
    pub fn try_emplace_default<T: DefaultBoxable<P>>(&mut self) -> Result<&mut T, AllocError> {
        self.raw.try_emplace_default(T::vtable_with_default())?;
        Ok(self.expect_value::<T>())
    }

    /// Stores a slice of `len` elements, the element at each index produced
    /// by `f(index)`.
    ///
    /// Elements already produced are dropped if `f` panics partway through.
    pub fn emplace_slice_with<T: Boxable<P>>(
        &mut self,
        len: usize,
        f: impl FnMut(usize) -> T,
    ) -> &mut [T] {
        match self.raw.try_emplace_slice_with(len, f, T::vtable()) {
            Ok(stored) => stored,
            Err(AllocError) => {
                let layout = Layout::array::<T>(len).unwrap_or_else(|_| Layout::new::<T>());
                emplace_failed(layout)
            }
        }
    }

    /// Fallible variant of [`emplace_slice_with`](AnyBox::emplace_slice_with).
    pub fn try_emplace_slice_with<T: Boxable<P>>(
        &mut self,
        len: usize,
        f: impl FnMut(usize) -> T,
    ) -> Result<&mut [T], AllocError> {
        self.raw.try_emplace_slice_with(len, f, T::vtable())
    }

    /// Stores a clone of every element of `values` as a boxed slice.
    pub fn emplace_slice_cloned<T: Boxable<P> + Clone>(&mut self, values: &[T]) -> &mut [T] {
        self.emplace_slice_with(values.len(), |i| values[i].clone())
    }

    /// Stores a slice of `len` default-constructed elements.
    pub fn emplace_slice_default<T: DefaultBoxable<P>>(&mut self, len: usize) -> &mut [T] {
        if self
            .raw
            .try_emplace_slice_default(len, T::vtable_with_default())
            .is_err()
        {
            let layout = Layout::array::<T>(len).unwrap_or_else(|_| Layout::new::<T>());
            emplace_failed(layout);
        }
        self.expect_slice::<T>()
    }

    /// Returns the stored value if it is a single `T`.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.raw.get::<T>()
    }

    /// Mutable variant of [`get`](AnyBox::get).
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.raw.get_mut::<T>()
    }

    /// Returns the stored slice if its element type is `T`.
    pub fn get_slice<T: 'static>(&self) -> Option<&[T]> {
        self.raw.get_slice::<T>()
    }

    /// Mutable variant of [`get_slice`](AnyBox::get_slice).
    pub fn get_slice_mut<T: 'static>(&mut self) -> Option<&mut [T]> {
        self.raw.get_slice_mut::<T>()
    }

    /// Moves the stored value out if it is a single `T`.
    ///
    /// The box becomes empty but keeps its capacity.
    pub fn take<T: 'static>(&mut self) -> Option<T> {
        self.raw.take::<T>()
    }

    /// Drops the stored value, if any, keeping the capacity.
    pub fn reset(&mut self) {
        self.raw.reset();
    }

    /// Moves this box onto another allocator instance.
    ///
    /// When the allocators are interchangeable the owned span moves across in
    /// O(1). Otherwise the value is relocated into a fresh span from `alloc`
    /// — still a move of the value, never a clone.
    #[must_use]
    pub fn transfer(self, alloc: A) -> Self {
        Self { raw: self.raw.transfer(alloc), _policy: PhantomData }
    }

    /// Exchanges the contents of two boxes, values and capacities both.
    ///
    /// With interchangeable allocators this is O(1); otherwise the values are
    /// moved through spans from each other's allocators.
    pub fn swap_values(&mut self, other: &mut Self) {
        self.raw.swap_with(&mut other.raw);
    }

    /// Fetches the value just emplaced as a single `T`.
    fn expect_value<T: 'static>(&mut self) -> &mut T {
        debug_assert!(self.ceiling_holds());
        match self.raw.get_mut::<T>() {
            Some(value) => value,
            // The emplace that just succeeded recorded exactly this type.
            None => unreachable!("emplaced value lost"),
        }
    }

    /// Fetches the slice just emplaced with element type `T`.
    fn expect_slice<T: 'static>(&mut self) -> &mut [T] {
        debug_assert!(self.ceiling_holds());
        match self.raw.get_slice_mut::<T>() {
            Some(slice) => slice,
            // The emplace that just succeeded recorded exactly this type.
            None => unreachable!("emplaced slice lost"),
        }
    }

    /// Whether the recorded descriptor respects the policy ceiling.
    fn ceiling_holds(&self) -> bool {
        self.raw
            .lifetime()
            .is_none_or(|req| P::CEILING.dominates(&req))
    }
}

impl<P: CloneablePolicy, A: Allocator> AnyBox<P, A> {
    /// Clone-assigns the value of `other` into this box.
    ///
    /// When both boxes hold the same type and shape, the value is assigned in
    /// place without reallocating. Otherwise the old value is dropped and a
    /// clone of `other`'s value is constructed, reusing the span when it
    /// fits. Cloning from an empty box empties this one.
    pub fn clone_value_from(&mut self, other: &Self) {
        if self.raw.try_clone_value_from(&other.raw).is_err() {
            emplace_failed(clone_layout(&other.raw));
        }
    }

    /// Fallible variant of [`clone_value_from`](AnyBox::clone_value_from).
    pub fn try_clone_value_from(&mut self, other: &Self) -> Result<(), AllocError> {
        self.raw.try_clone_value_from(&other.raw)
    }
}

/// The layout a clone of `src`'s value would need; used only for the
/// allocation-failure diagnostic.
fn clone_layout<A: Allocator>(src: &RawBox<A>) -> Layout {
    src.adaptor()
        .map_or(Layout::new::<()>(), |adaptor| adaptor.value_layout())
}

impl<P: LifetimePolicy, A: Allocator + Default> AnyBox<P, A> {
    /// Creates an empty box drawing from `A::default()`.
    pub fn new() -> Self {
        Self::new_in(A::default())
    }
}

impl<P: LifetimePolicy, A: Allocator + Default> Default for AnyBox<P, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: CloneablePolicy, A: Allocator + Clone> Clone for AnyBox<P, A> {
    fn clone(&self) -> Self {
        let mut out = Self::new_in(self.raw.allocator().clone());
        out.clone_value_from(self);
        out
    }

    fn clone_from(&mut self, source: &Self) {
        self.clone_value_from(source);
    }
}

impl<P: LifetimePolicy, A: Allocator> fmt::Debug for AnyBox<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("AnyBox");
        match self.raw.type_name() {
            Some(name) => s.field("type", &name).field("size", &self.value_size()),
            None => s.field("type", &"<empty>"),
        }
        .finish()
    }
}
