//! Commonly used items for convenient importing.
//!
//! # Usage
//!
//! ```rust
//! use anybox::prelude::*;
//!
//! let mut b: TrivialBox = TrivialBox::new();
//! b.emplace([1u8, 2, 3, 4]);
//! let copy = b.clone();
//! assert_eq!(copy.get::<[u8; 4]>(), Some(&[1, 2, 3, 4]));
//! ```
//!
//! # What's Included
//!
//! - **[`AnyBox`]** and the three policy aliases **[`UniqueBox`]**,
//!   **[`NormalBox`]**, **[`TrivialBox`]**
//! - **[`Allocator`]** and **[`Global`]**: the allocator capability and its
//!   global-heap implementation
//! - **[`markers`]**: the lifetime policies and the [`Boxable`] bridge traits
//! - **[`Any`]**: re-exported from `core::any` for dynamic typing
//!
//! [`Boxable`]: crate::markers::Boxable

pub use core::any::Any;

pub use crate::{Allocator, AnyBox, Global, NormalBox, TrivialBox, UniqueBox, markers};
