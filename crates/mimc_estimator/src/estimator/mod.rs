//! The estimator: owns the strategies, the sampler and all internal state,
//! and drives estimation runs.
//!
//! ## Module Structure
//!
//! - [`statistics`]: per-index statistics, rate fitting, bias
//! - [`allocation`]: splitting and sample allocation
//! - [`adaptive`]: profit-driven growth of adaptive index sets
//! - `unbiased`: the randomised single-term estimator
//! - `run`: the control loop and continuation
//!
//! ## Usage Example
//!
//! ```rust
//! use mimc_core::index_set::IndexSet;
//! use mimc_core::math::Uncertainty;
//! use mimc_estimator::{Estimator, SampleMethod, SampleOutput, SamplingError};
//!
//! let sampler = |_: &mimc_core::types::Index, inputs: &[f64]| {
//!     let q = 3.0 + inputs[0];
//!     Ok::<_, SamplingError>(SampleOutput::scalar(q, q))
//! };
//! let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), sampler)
//!     .distributions(vec![Uncertainty::standard_normal()])
//!     .option("seed", 42_usize)
//!     .build()
//!     .unwrap();
//!
//! let outcome = estimator.run(0.1).unwrap();
//! assert!(outcome.is_converged());
//! assert!((estimator.mean()[0] - 3.0).abs() < 0.5);
//! ```

pub mod adaptive;
pub mod allocation;
mod run;
pub mod statistics;
mod unbiased;

pub use run::RunOutcome;
pub use statistics::{IndexStatistics, RateModel, Rates};

use crate::config::EstimatorOptions;
use crate::error::{EstimatorError, SamplingError};
use crate::executor::{BatchExecutor, SampleJob, SampleRecord, SequentialExecutor};
use crate::history::{History, HistoryStore, JsonFileStore};
use crate::internals::EstimatorInternals;
use crate::rng::{HaltonSequence, LowDiscrepancySequence, ShiftedSequence};
use crate::sample_method::SampleMethod;
use crate::sampler::{CostModel, Sampler};
use mimc_core::config::{ConfigError, OptionMap, OptionValue};
use mimc_core::index_set::IndexSet;
use mimc_core::math::Uncertainty;
use mimc_core::types::Index;
use std::collections::BTreeSet;
use std::time::Instant;

/// Builder for [`Estimator`].
pub struct EstimatorBuilder<S> {
    index_set: IndexSet,
    method: SampleMethod,
    sampler: S,
    distributions: Vec<Uncertainty>,
    options: OptionMap,
    cost_model: Option<Box<dyn CostModel>>,
    executor: Option<Box<dyn BatchExecutor>>,
    store: Option<Box<dyn HistoryStore>>,
}

impl<S: Sampler> EstimatorBuilder<S> {
    /// Distributions of the uncertain inputs, one per input.
    pub fn distributions(mut self, distributions: Vec<Uncertainty>) -> Self {
        self.distributions = distributions;
        self
    }

    /// Sets one option.
    pub fn option(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Sets several options; later values override earlier ones.
    pub fn options(mut self, options: OptionMap) -> Self {
        self.options.extend(options);
        self
    }

    /// Cost model replacing measured wall-clock time.
    pub fn cost_model(mut self, cost_model: impl CostModel + 'static) -> Self {
        self.cost_model = Some(Box::new(cost_model));
        self
    }

    /// Batch executor; sequential by default.
    pub fn executor(mut self, executor: impl BatchExecutor + 'static) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    /// Storage collaborator for the history. Without one, a
    /// [`JsonFileStore`] on `folder`/`name` is used when `save` is enabled.
    pub fn history_store(mut self, store: impl HistoryStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Validates the configuration and creates the estimator.
    ///
    /// No sample is drawn here.
    ///
    /// # Errors
    ///
    /// `ConfigError` for unknown keys, invalid values, invalid distributions
    /// or conflicting options.
    pub fn build(self) -> Result<Estimator<S>, ConfigError> {
        let mut index_set = self.index_set;
        let mut method = self.method;
        let options = EstimatorOptions::from_map(&mut index_set, &mut method, &self.options)?;
        options.validate(&index_set, &method, self.distributions.len())?;
        if let Some(k) = self.distributions.iter().position(|d| !d.is_valid()) {
            return Err(ConfigError::invalid_value(
                "distributions",
                format!("distribution {} has invalid parameters", k),
            ));
        }

        let store = match self.store {
            Some(store) => Some(store),
            None if options.save => Some(Box::new(JsonFileStore::new(
                &options.folder,
                &options.name,
            )) as Box<dyn HistoryStore>),
            None => None,
        };
        let internals = EstimatorInternals::new(&index_set, &method, &options);
        let rates = Rates::defaults(
            index_set.dim(),
            options.default_alpha,
            options.default_beta,
            options.default_gamma,
        );
        let splitting = allocation::default_splitting(&options);

        Ok(Estimator {
            index_set,
            method,
            sampler: self.sampler,
            distributions: self.distributions,
            options,
            cost_model: self.cost_model,
            executor: self
                .executor
                .unwrap_or_else(|| Box::new(SequentialExecutor)),
            store,
            internals,
            rates,
            splitting,
            history: History::new(),
        })
    }
}

/// Multilevel / multi-index Monte Carlo estimator.
///
/// Owns its index-set strategy, sample method, internal accumulators and
/// history. The sampler is any [`Sampler`]; pass a reference to keep
/// ownership with the caller.
pub struct Estimator<S> {
    index_set: IndexSet,
    method: SampleMethod,
    sampler: S,
    distributions: Vec<Uncertainty>,
    options: EstimatorOptions,
    cost_model: Option<Box<dyn CostModel>>,
    executor: Box<dyn BatchExecutor>,
    store: Option<Box<dyn HistoryStore>>,
    internals: EstimatorInternals,
    rates: Rates,
    splitting: f64,
    history: History,
}

impl<S: Sampler> Estimator<S> {
    /// Starts building an estimator.
    pub fn builder(index_set: IndexSet, method: SampleMethod, sampler: S) -> EstimatorBuilder<S> {
        EstimatorBuilder {
            index_set,
            method,
            sampler,
            distributions: Vec::new(),
            options: OptionMap::new(),
            cost_model: None,
            executor: None,
            store: None,
        }
    }

    /// Index-set strategy.
    #[inline]
    pub fn index_set(&self) -> &IndexSet {
        &self.index_set
    }

    /// Sample method.
    #[inline]
    pub fn sample_method(&self) -> &SampleMethod {
        &self.method
    }

    /// Core options.
    #[inline]
    pub fn options(&self) -> &EstimatorOptions {
        &self.options
    }

    /// Internal state.
    #[inline]
    pub fn internals(&self) -> &EstimatorInternals {
        &self.internals
    }

    /// Seed of the random number generator.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.internals.rng.seed()
    }

    /// Index set currently sampled.
    #[inline]
    pub fn current_index_set(&self) -> &BTreeSet<Index> {
        self.internals.current_set()
    }

    /// Samples per shift at `index`.
    #[inline]
    pub fn nb_of_samples(&self, index: &Index) -> usize {
        self.internals.nb_of_samples(index)
    }

    /// Mean difference of quantity `qoi` at `index` (0 if unsampled).
    pub fn index_mean(&self, index: &Index, qoi: usize) -> f64 {
        self.internals
            .accumulators(index)
            .map_or(0.0, |acc| acc.mean(qoi))
    }

    /// Per-sample variance of the differences of quantity `qoi` at `index`.
    pub fn index_variance(&self, index: &Index, qoi: usize) -> f64 {
        self.internals
            .accumulators(index)
            .map_or(0.0, |acc| acc.sample_variance(qoi))
    }

    /// Average cost of one sample at `index`.
    pub fn index_cost(&self, index: &Index) -> Option<f64> {
        self.internals
            .accumulators(index)
            .and_then(|acc| acc.cost_per_sample())
    }

    /// Most recently fitted rate models.
    #[inline]
    pub fn rates(&self) -> &Rates {
        &self.rates
    }

    /// Splitting parameter of the most recent allocation.
    #[inline]
    pub fn splitting(&self) -> f64 {
        self.splitting
    }

    /// History of completed tolerances.
    #[inline]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Estimate of the expectation, one entry per quantity of interest.
    pub fn mean(&self) -> Vec<f64> {
        if let Some(state) = self.internals.unbiased() {
            return state.global.iter().map(|acc| acc.mean()).collect();
        }
        (0..self.options.nb_of_qoi)
            .map(|qoi| {
                self.internals
                    .current_set()
                    .iter()
                    .map(|index| self.index_mean(index, qoi))
                    .sum()
            })
            .collect()
    }

    /// Variance of the estimator for the controlling quantity of interest.
    pub fn varest(&self) -> f64 {
        let qoi = self.controlling_qoi();
        if let Some(state) = self.internals.unbiased() {
            let acc = &state.global[qoi];
            return match acc.count() {
                0 => 0.0,
                n => acc.variance() / n as f64,
            };
        }
        self.index_statistics(qoi).iter().map(|s| s.varest).sum()
    }

    /// Estimated mean squared error, `bias² + varest`.
    pub fn mse(&self) -> f64 {
        let bias = self.bias();
        bias * bias + self.varest()
    }

    /// Estimated root mean squared error.
    pub fn rmse(&self) -> f64 {
        self.mse().sqrt()
    }

    /// Total accumulated cost over all indices.
    pub fn total_work(&self) -> f64 {
        self.internals.accumulators.values().map(|acc| acc.work()).sum()
    }

    /// Total accumulated wall-clock time over all indices.
    pub fn total_time(&self) -> f64 {
        self.internals.accumulators.values().map(|acc| acc.time()).sum()
    }

    /// Clears all samples, index-set progress and history.
    pub fn reset(&mut self) {
        self.internals.reset(&self.index_set, &self.options);
        self.rates = Rates::defaults(
            self.index_set.dim(),
            self.options.default_alpha,
            self.options.default_beta,
            self.options.default_gamma,
        );
        self.splitting = allocation::default_splitting(&self.options);
        self.history = History::new();
    }

    /// Evaluates `count` samples at `index` without recording them.
    ///
    /// For quasi-Monte Carlo, `shift` selects one random shift; `None` draws
    /// `count` points for every shift. The points come from a copy of the
    /// index's generators, so the recorded points stay a contiguous prefix
    /// of each shifted sequence. Monte Carlo ignores `shift` and advances
    /// the estimator's random stream.
    pub fn generate(
        &mut self,
        index: &Index,
        count: usize,
        shift: Option<usize>,
    ) -> Result<Vec<SampleRecord>, EstimatorError> {
        let shifts = match shift {
            Some(r) if r < self.method.nb_of_shifts() => vec![r],
            Some(r) => {
                return Err(ConfigError::invalid_value(
                    "shift",
                    format!(
                        "shift {} out of range for {} shifts",
                        r,
                        self.method.nb_of_shifts()
                    ),
                )
                .into())
            }
            None => (0..self.method.nb_of_shifts()).collect(),
        };
        let mut jobs = Vec::with_capacity(count * shifts.len());
        // creates the generators of a new index before they are copied
        self.push_jobs(&mut jobs, index, 0, 0);
        let saved = self.internals.generators.get(index).cloned();
        for r in shifts {
            self.push_jobs(&mut jobs, index, r, count);
        }
        if let (Some(saved), Some(generators)) = (saved, self.internals.generators.get_mut(index)) {
            *generators = saved;
        }
        self.execute(&jobs)
    }

    /// Draws `count` samples per shift at `index` and records them.
    pub fn sample(&mut self, index: &Index, count: usize) -> Result<(), EstimatorError> {
        self.sample_batch(&[(index.clone(), count)])
    }

    /// Draws and records several per-index requests as one batch.
    pub(crate) fn sample_batch(&mut self, requests: &[(Index, usize)]) -> Result<(), EstimatorError> {
        let nb_of_shifts = self.method.nb_of_shifts();
        let mut jobs = Vec::new();
        for (index, count) in requests {
            for r in 0..nb_of_shifts {
                self.push_jobs(&mut jobs, index, r, *count);
            }
        }
        let records = self.execute(&jobs)?;
        for record in &records {
            self.merge(record);
        }
        Ok(())
    }

    /// Appends `count` jobs for `index` and shift `shift`; inputs are drawn
    /// here, on the owning thread.
    pub(crate) fn push_jobs(
        &mut self,
        jobs: &mut Vec<SampleJob>,
        index: &Index,
        shift: usize,
        count: usize,
    ) {
        let nb_of_inputs = self.distributions.len();
        if self.method.is_qmc() {
            let nb_of_shifts = self.method.nb_of_shifts();
            let internals = &mut self.internals;
            let rng = &mut internals.rng;
            let generators = internals.generators.get_or_insert_with(index, || {
                (0..nb_of_shifts)
                    .map(|_| {
                        let shift = rng.gen_shift(nb_of_inputs);
                        ShiftedSequence::new(HaltonSequence::new(nb_of_inputs), shift)
                    })
                    .collect()
            });
            for _ in 0..count {
                let point = generators[shift].next_point();
                let inputs = point
                    .iter()
                    .zip(&self.distributions)
                    .map(|(&u, dist)| dist.from_unit(u))
                    .collect();
                jobs.push(SampleJob {
                    index: index.clone(),
                    shift,
                    inputs,
                });
            }
        } else {
            for _ in 0..count {
                let mut inputs = vec![0.0; nb_of_inputs];
                self.internals
                    .rng
                    .fill_inputs(&self.distributions, &mut inputs);
                jobs.push(SampleJob {
                    index: index.clone(),
                    shift,
                    inputs,
                });
            }
        }
    }

    /// Runs a batch on the executor.
    ///
    /// Every job is evaluated; the first failure in job order is returned
    /// and no record of the batch is kept.
    pub(crate) fn execute(&self, jobs: &[SampleJob]) -> Result<Vec<SampleRecord>, EstimatorError> {
        let sampler = &self.sampler;
        let nb_of_qoi = self.options.nb_of_qoi;
        let run = move |job: &SampleJob| -> Result<SampleRecord, SamplingError> {
            let start = Instant::now();
            let output = sampler.sample(&job.index, &job.inputs)?;
            let elapsed = start.elapsed().as_secs_f64();
            output.check(nb_of_qoi)?;
            Ok(SampleRecord {
                index: job.index.clone(),
                shift: job.shift,
                output,
                elapsed,
            })
        };
        self.executor
            .execute(jobs, &run)
            .into_iter()
            .zip(jobs)
            .map(|(result, job)| {
                result.map_err(|source| EstimatorError::Sampling {
                    index: job.index.clone(),
                    source,
                })
            })
            .collect()
    }

    /// Cost of one recorded sample: cost model, then sampler-reported cost,
    /// then measured time.
    pub(crate) fn sample_cost(&self, record: &SampleRecord) -> f64 {
        self.cost_model
            .as_ref()
            .and_then(|model| model.cost(&record.index))
            .or(record.output.cost)
            .unwrap_or(record.elapsed)
    }

    /// Folds one record into the accumulators of its index.
    pub(crate) fn merge(&mut self, record: &SampleRecord) {
        let cost = self.sample_cost(record);
        self.internals
            .accumulators_mut(&record.index)
            .push(record.shift, &record.output, cost, record.elapsed);
    }
}
