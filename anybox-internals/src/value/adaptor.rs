//! The per-value dispatcher handle.
//!
//! A [`ValueAdaptor`] pairs a [`ValueVtable`] with the shape of the stored
//! value: a single element or a slice with its element count. The count is
//! the one piece of per-instance state the erasure machinery carries — the
//! vtable itself is a shared `&'static`.
//!
//! Equality between adaptors is equality of recorded type identity and
//! shape. That is the test the box uses to decide between "reuse the
//! allocation and assign" and "destroy, reallocate, construct".

use core::{alloc::Layout, any::TypeId, fmt, ptr::NonNull};

use crate::{allocation::Allocation, lifetime::LifetimeReq, value::vtable::ValueVtable};

/// What shape of value an adaptor describes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Shape {
    /// A single element.
    Single,
    /// A slice of elements with the given count.
    Slice(usize),
}

/// A type-erased dispatcher set for one stored value.
#[derive(Clone, Copy)]
pub struct ValueAdaptor {
    /// The operation table for the element type.
    vtable: &'static ValueVtable,
    /// Single value or slice-with-count.
    shape: Shape,
}

impl ValueAdaptor {
    /// Creates an adaptor for a single value of the vtable's element type.
    #[inline]
    pub fn new(vtable: &'static ValueVtable) -> Self {
        Self { vtable, shape: Shape::Single }
    }

    /// Creates an adaptor for a slice of `len` elements.
    #[inline]
    pub fn new_slice(vtable: &'static ValueVtable, len: usize) -> Self {
        Self { vtable, shape: Shape::Slice(len) }
    }

    /// Number of elements the adaptor dispatches over.
    #[inline]
    pub fn len(&self) -> usize {
        match self.shape {
            Shape::Single => 1,
            Shape::Slice(len) => len,
        }
    }

    /// Whether the adaptor describes a slice rather than a single value.
    #[inline]
    pub fn is_slice(&self) -> bool {
        matches!(self.shape, Shape::Slice(_))
    }

    /// Size of the stored value in bytes.
    #[inline]
    pub fn value_size(&self) -> usize {
        self.vtable.elem_layout().size() * self.len()
    }

    /// Layout of the stored value.
    ///
    /// The multiplication cannot overflow for adaptors created through the
    /// box, which validates the slice layout before allocating.
    pub fn value_layout(&self) -> Layout {
        let elem = self.vtable.elem_layout();
        // An element's size is always a multiple of its alignment, so the
        // array layout is a plain multiply.
        Layout::from_size_align(self.value_size(), elem.align())
            .unwrap_or_else(|_| panic!("value layout overflow for {}", self.type_name()))
    }

    /// The [`TypeId`] of the element type.
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.vtable.type_id()
    }

    /// The [`core::any::type_name`] of the element type.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.vtable.type_name()
    }

    /// The recorded lifetime descriptor.
    #[inline]
    pub fn lifetime(&self) -> LifetimeReq {
        self.vtable.lifetime()
    }

    /// Whether the adaptor describes a single value of type `T`.
    #[inline]
    pub fn is_type<T: 'static>(&self) -> bool {
        self.shape == Shape::Single && self.type_id() == TypeId::of::<T>()
    }

    /// Whether the adaptor describes a slice with element type `T`.
    #[inline]
    pub fn is_slice_of<T: 'static>(&self) -> bool {
        self.is_slice() && self.type_id() == TypeId::of::<T>()
    }

    /// Asserts the size/alignment precondition on every dispatch target.
    ///
    /// A violation is a bug in the calling container, so this is a debug
    /// assertion, not a recoverable error.
    fn size_validate(&self, allocation: &Allocation) {
        debug_assert!(
            allocation.fits(self.value_layout()),
            "allocation too small for {} x{}",
            self.type_name(),
            self.len(),
        );
    }

    /// Pointer to the first element slot of `allocation`.
    fn data(&self, allocation: &Allocation) -> NonNull<u8> {
        self.size_validate(allocation);
        if self.value_size() == 0 {
            // Zero bytes live anywhere, but the base must still satisfy the
            // element alignment.
            return crate::allocator::dangling_for(self.vtable.elem_layout());
        }
        allocation.as_ptr()
    }

    /// Default-constructs the value into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor marks default-construct ill-formed.
    ///
    /// # Safety
    ///
    /// The caller must ensure `dst` fits the value and holds no live value.
    pub unsafe fn default_construct(&self, dst: &Allocation) {
        // SAFETY: `dst` fits `len` elements and is vacant (caller).
        unsafe { self.vtable.default_construct(self.data(dst), self.len()) };
    }

    /// Clone-constructs the value in `src` into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor marks copy-construct ill-formed.
    ///
    /// # Safety
    ///
    /// The caller must ensure `src` holds a live value of this adaptor's
    /// type and shape, and `dst` fits the value, is vacant, and does not
    /// overlap `src`.
    pub unsafe fn clone_construct(&self, src: &Allocation, dst: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.clone_construct(self.data(src), self.data(dst), self.len()) };
    }

    /// Bitwise-moves the value in `src` into `dst`; `src` becomes logically
    /// uninitialized.
    ///
    /// # Safety
    ///
    /// Same as [`clone_construct`](Self::clone_construct), and the caller
    /// must treat the source value as gone afterwards.
    pub unsafe fn relocate(&self, src: &Allocation, dst: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.relocate(self.data(src), self.data(dst), self.len()) };
    }

    /// Clone-assigns the value in `src` onto the live value in `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor marks copy-assign ill-formed.
    ///
    /// # Safety
    ///
    /// The caller must ensure both allocations hold live values of this
    /// adaptor's type and shape and do not overlap.
    pub unsafe fn clone_assign(&self, src: &Allocation, dst: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.clone_assign(self.data(src), self.data(dst), self.len()) };
    }

    /// Drops the live value in `dst`, then bitwise-moves `src` over it;
    /// `src` becomes logically uninitialized.
    ///
    /// # Safety
    ///
    /// Same as [`clone_assign`](Self::clone_assign), and the caller must
    /// treat the source value as gone afterwards.
    pub unsafe fn move_assign(&self, src: &Allocation, dst: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.move_assign(self.data(src), self.data(dst), self.len()) };
    }

    /// Destroys the live value in `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure `dst` holds a live value of this adaptor's
    /// type and shape, and must treat it as gone afterwards.
    pub unsafe fn destroy(&self, dst: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.drop_in(self.data(dst), self.len()) };
    }

    /// Swaps the live values in `a` and `b`.
    ///
    /// # Safety
    ///
    /// The caller must ensure both allocations hold live values of this
    /// adaptor's type and shape and do not overlap.
    pub unsafe fn swap(&self, a: &Allocation, b: &Allocation) {
        // SAFETY: Requirements forwarded from the caller.
        unsafe { self.vtable.swap(self.data(a), self.data(b), self.len()) };
    }
}

impl PartialEq for ValueAdaptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id() && self.shape == other.shape
    }
}

impl Eq for ValueAdaptor {}

impl fmt::Debug for ValueAdaptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueAdaptor")
            .field("type_name", &self.type_name())
            .field("shape", &self.shape)
            .finish()
    }
}
