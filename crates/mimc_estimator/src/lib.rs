//! # mimc_estimator: Adaptive Multilevel / Multi-Index Monte Carlo Engine
//!
//! ## Layer 2 (Engine) Role
//!
//! mimc_estimator drives estimation runs on top of mimc_core:
//! - The estimator and its control loop: `Estimator`, `EstimatorBuilder`,
//!   `RunOutcome` (`estimator`)
//! - Sample methods: Monte Carlo and randomly shifted quasi-Monte Carlo
//!   (`sample_method`, `rng`)
//! - Sampling and cost contracts: `Sampler`, `CostModel`, `SampleOutput`
//!   (`sampler`)
//! - Batch execution strategies, sequential or on a rayon pool (`executor`)
//! - Core options and their validation (`config`)
//! - Append-only run history with optional JSON persistence (`history`)
//!
//! ## Dependencies
//!
//! - mimc_core: indices, index sets, regression, distributions
//! - rand / rand_distr: seeded pseudo-random inputs
//! - rayon: parallel batch execution
//! - serde / serde_json / toml / chrono: history records and option files
//! - thiserror: structured errors
//! - tracing: structured log events
//!
//! ## Usage Examples
//!
//! ```rust
//! use mimc_core::index_set::IndexSet;
//! use mimc_core::math::Uncertainty;
//! use mimc_core::types::Index;
//! use mimc_estimator::{Estimator, SampleMethod, SampleOutput, SamplingError};
//!
//! // ΔQ_ℓ has mean 2^-2ℓ above the root; E[Q] = 1 + 1/3
//! let sampler = |index: &Index, inputs: &[f64]| {
//!     let l = index[0] as i32;
//!     let z = inputs[0];
//!     let diff = if l == 0 { 1.0 + z } else { 4f64.powi(-l) + 2f64.powi(-l) * z };
//!     Ok::<_, SamplingError>(SampleOutput::scalar(diff, diff))
//! };
//!
//! let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
//!     .distributions(vec![Uncertainty::standard_normal()])
//!     .cost_model(|index: &Index| 2f64.powi(index[0] as i32))
//!     .option("seed", 1_usize)
//!     .build()
//!     .unwrap();
//!
//! let outcome = estimator.run(0.05).unwrap();
//! assert!(outcome.is_converged());
//! assert!(estimator.rmse() <= 0.05);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod config;
pub mod error;
pub mod estimator;
pub mod executor;
pub mod history;
pub mod internals;
pub mod rng;
pub mod sample_method;
pub mod sampler;

pub use config::EstimatorOptions;
pub use error::{EstimatorError, HistoryError, SamplingError};
pub use estimator::{Estimator, EstimatorBuilder, RunOutcome};
pub use executor::{BatchExecutor, RayonExecutor, SequentialExecutor};
pub use history::{History, HistoryRecord, HistoryStore, JsonFileStore};
pub use sample_method::SampleMethod;
pub use sampler::{CostModel, SampleOutput, Sampler};
