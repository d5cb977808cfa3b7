//! # Random Number Generation Infrastructure
//!
//! Input generation for the estimators. All inputs are produced by the thread
//! that owns the estimator before a batch is dispatched, so results do not
//! depend on the number of worker threads.
//!
//! ## Module Structure
//!
//! - [`prng`]: Seeded pseudo-random generator for Monte Carlo inputs
//! - [`qmc`]: Halton sequence and Cranley-Patterson random shifts
//!
//! ## Usage Example
//!
//! ```rust
//! use mimc_estimator::rng::{EstimatorRng, HaltonSequence, LowDiscrepancySequence, ShiftedSequence};
//!
//! let mut rng = EstimatorRng::from_seed(12345);
//! let shift = rng.gen_shift(3);
//! let mut points = ShiftedSequence::new(HaltonSequence::new(3), shift);
//! let p = points.next_point();
//! assert_eq!(p.len(), 3);
//! ```

pub mod prng;
pub mod qmc;

pub use prng::EstimatorRng;
pub use qmc::{HaltonSequence, LowDiscrepancySequence, ShiftedSequence};
