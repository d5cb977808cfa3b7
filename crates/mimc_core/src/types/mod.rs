//! Core value types.
//!
//! - [`Index`]: multi-dimensional discretisation index

mod index;

pub use index::Index;
