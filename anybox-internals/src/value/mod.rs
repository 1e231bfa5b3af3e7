//! Type-erased value dispatch: the vtable and the per-value adaptor.

pub(crate) mod adaptor;
pub(crate) mod vtable;

pub use adaptor::ValueAdaptor;
pub use vtable::ValueVtable;
