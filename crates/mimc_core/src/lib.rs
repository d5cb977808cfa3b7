//! # mimc_core: Foundations for Multilevel and Multi-Index Monte Carlo
//!
//! ## Layer 1 (Foundation) Role
//!
//! mimc_core is the bottom layer of the estimation workspace, providing:
//! - The discretisation index type: `Index` (`types`)
//! - Index-set strategies and their size bookkeeping: `IndexSet`,
//!   `IndexSetSize`, `AdaptiveSet` (`index_set`)
//! - Option values and configuration errors: `OptionValue`, `ConfigError`
//!   (`config`)
//! - Numerical helpers: least-squares regression, streaming moments, input
//!   distributions (`math`)
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other mimc_* crates, with minimal external
//! dependencies:
//! - thiserror: Structured error types
//! - serde: Serialisation of indices, option values and distributions
//!
//! ## Usage Examples
//!
//! ```rust
//! use mimc_core::index_set::IndexSet;
//! use mimc_core::types::Index;
//!
//! // Multilevel hierarchy with levels 0..=3
//! let ml = IndexSet::ml();
//! assert_eq!(ml.enumerate(3).len(), 4);
//!
//! // Total-degree multi-index set grows monotonically
//! let td = IndexSet::td(2);
//! assert!(td.enumerate(2).is_subset(&td.enumerate(3)));
//! assert!(td.enumerate(3).contains(&Index::from([1, 2])));
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod index_set;
pub mod math;
pub mod types;
