//! Value-level lifetime descriptors.
//!
//! A [`LifetimeReq`] records, per special operation, whether an erased value
//! supports it and whether the operation can fail (panic). It is the runtime
//! counterpart of what a generic context would express through trait bounds:
//! the vtable constructors in [`crate::value`] translate their bounds
//! (`Copy`, `Clone`, `Default`) into a descriptor once, and everything
//! downstream consults the descriptor instead of the bounds.
//!
//! Descriptors form a lattice under the pointwise order: [`at_least`] is the
//! join, and [`PartialOrd`] deliberately yields `None` for descriptors that
//! each win on some field. That partial order is a documented law, not an
//! accident — see the tests at the bottom of this file.

/// Support level for a single operation.
///
/// Ordered by increasing capability: an operation that cannot fail is
/// strictly more capable than one that may panic, which is strictly more
/// capable than one that does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExprSupport {
    /// The operation is not available.
    IllFormed,
    /// The operation is available but may panic.
    WellFormed,
    /// The operation is available and cannot fail.
    NoException,
}

impl ExprSupport {
    /// Pointwise meet: the weaker of the two levels.
    pub const fn meet(self, other: Self) -> Self {
        if (self as u8) <= (other as u8) { self } else { other }
    }

    /// Pointwise join: the stronger of the two levels.
    pub const fn join(self, other: Self) -> Self {
        if (self as u8) >= (other as u8) { self } else { other }
    }

    /// Whether the operation exists at all.
    pub const fn is_well_formed(self) -> bool {
        !matches!(self, Self::IllFormed)
    }

    /// Whether the operation exists and cannot fail.
    pub const fn is_noexcept(self) -> bool {
        matches!(self, Self::NoException)
    }
}

/// A descriptor of which special operations an erased value supports.
///
/// One field per operation of the value adaptor. `destruct` is never
/// [`ExprSupport::IllFormed`] in a descriptor recorded by a vtable — every
/// boxed value must be destructible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LifetimeReq {
    /// Construct a value with no arguments.
    pub default_construct: ExprSupport,
    /// Construct a value by moving from another span.
    pub move_construct: ExprSupport,
    /// Construct a value by cloning from another span.
    pub copy_construct: ExprSupport,
    /// Overwrite a live value by moving from another span.
    pub move_assign: ExprSupport,
    /// Overwrite a live value by cloning from another span.
    pub copy_assign: ExprSupport,
    /// Destroy a live value.
    pub destruct: ExprSupport,
    /// Exchange two live values.
    pub swap: ExprSupport,
}

impl LifetimeReq {
    /// A descriptor with every field at the given level.
    const fn uniform(level: ExprSupport) -> Self {
        Self {
            default_construct: level,
            move_construct: level,
            copy_construct: level,
            move_assign: level,
            copy_assign: level,
            destruct: level,
            swap: level,
        }
    }

    /// The trivial level: every operation present and infallible.
    pub const fn trivial() -> Self {
        Self::uniform(ExprSupport::NoException)
    }

    /// The normal level: every operation present, any may panic.
    pub const fn normal() -> Self {
        Self::uniform(ExprSupport::WellFormed)
    }

    /// The unique (move-only) level: copy operations absent.
    pub const fn unique() -> Self {
        Self {
            copy_construct: ExprSupport::IllFormed,
            copy_assign: ExprSupport::IllFormed,
            ..Self::normal()
        }
    }

    /// The bottom of the lattice: no operations at all.
    pub const fn ill_formed() -> Self {
        Self::uniform(ExprSupport::IllFormed)
    }

    /// The fields in a fixed order, for pointwise operations.
    const fn fields(self) -> [ExprSupport; 7] {
        [
            self.default_construct,
            self.move_construct,
            self.copy_construct,
            self.move_assign,
            self.copy_assign,
            self.destruct,
            self.swap,
        ]
    }

    /// Pointwise meet: caps `self` at `other` in every field.
    ///
    /// This is how a policy ceiling is applied to the support a type actually
    /// has.
    pub const fn meet(self, other: Self) -> Self {
        Self {
            default_construct: self.default_construct.meet(other.default_construct),
            move_construct: self.move_construct.meet(other.move_construct),
            copy_construct: self.copy_construct.meet(other.copy_construct),
            move_assign: self.move_assign.meet(other.move_assign),
            copy_assign: self.copy_assign.meet(other.copy_assign),
            destruct: self.destruct.meet(other.destruct),
            swap: self.swap.meet(other.swap),
        }
    }

    /// Whether every field of `other` is at most the corresponding field of
    /// `self`.
    pub fn dominates(&self, other: &Self) -> bool {
        self.fields()
            .iter()
            .zip(other.fields())
            .all(|(a, b)| *a >= b)
    }
}

/// The pointwise join of two descriptors: the smallest descriptor that
/// dominates both.
///
/// Idempotent and commutative.
pub const fn at_least(a: LifetimeReq, b: LifetimeReq) -> LifetimeReq {
    LifetimeReq {
        default_construct: a.default_construct.join(b.default_construct),
        move_construct: a.move_construct.join(b.move_construct),
        copy_construct: a.copy_construct.join(b.copy_construct),
        move_assign: a.move_assign.join(b.move_assign),
        copy_assign: a.copy_assign.join(b.copy_assign),
        destruct: a.destruct.join(b.destruct),
        swap: a.swap.join(b.swap),
    }
}

impl PartialOrd for LifetimeReq {
    /// Pointwise comparison. Two descriptors that each have a field strictly
    /// greater than the other's are unordered and compare as `None`.
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        use core::cmp::Ordering;

        let mut ordering = Ordering::Equal;
        for (a, b) in self.fields().iter().zip(other.fields()) {
            match (ordering, a.cmp(&b)) {
                (_, Ordering::Equal) => {}
                (Ordering::Equal, field) => ordering = field,
                (Ordering::Less, Ordering::Greater) | (Ordering::Greater, Ordering::Less) => {
                    return None;
                }
                _ => {}
            }
        }
        Some(ordering)
    }
}
