//! Control loop: warm-up, rate fitting, splitting, allocation, convergence
//! check and index-set growth, with optional continuation over a decreasing
//! sequence of tolerances.

use super::allocation;
use super::Estimator;
use crate::error::EstimatorError;
use crate::history::{HistoryRecord, IndexRecord, RateSummary};
use crate::sampler::Sampler;
use mimc_core::types::Index;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Terminal state of one tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunOutcome {
    /// `bias² + varest ≤ tol²` was reached.
    Converged {
        /// Tolerance met.
        tol: f64,
    },
    /// The index set hit its bound before the tolerance was met.
    IndexSetExhausted {
        /// Tolerance that was not met.
        tol: f64,
    },
}

impl RunOutcome {
    /// `true` for [`RunOutcome::Converged`].
    #[inline]
    pub fn is_converged(&self) -> bool {
        matches!(self, RunOutcome::Converged { .. })
    }

    /// Tolerance the outcome refers to.
    #[inline]
    pub fn tol(&self) -> f64 {
        match self {
            RunOutcome::Converged { tol } | RunOutcome::IndexSetExhausted { tol } => *tol,
        }
    }
}

impl<S: Sampler> Estimator<S> {
    /// Estimates the expectation to tolerance `tol`.
    ///
    /// With `continuate`, runs the tolerances of [`Estimator::tolerances`]
    /// from the loosest to `tol`, stopping early if one is not met. One
    /// history record is appended per tolerance attempted.
    ///
    /// # Errors
    ///
    /// `EstimatorError::InvalidTolerance` if `tol` is not finite and
    /// positive; sampling failures and history persistence failures are
    /// propagated.
    pub fn run(&mut self, tol: f64) -> Result<RunOutcome, EstimatorError> {
        if !(tol.is_finite() && tol > 0.0) {
            return Err(EstimatorError::InvalidTolerance(tol));
        }
        let tolerances = self.tolerances(tol);
        let (last, leading) = match tolerances.split_last() {
            Some(split) => split,
            None => return Err(EstimatorError::InvalidTolerance(tol)),
        };
        for &t in leading {
            let outcome = self.run_tolerance(t)?;
            if !outcome.is_converged() {
                return Ok(outcome);
            }
        }
        self.run_tolerance(*last)
    }

    /// Tolerances visited by [`Estimator::run`]: `tol · mul^k` for
    /// `k = nb_of_tols - 1, ..., 0` under continuation, otherwise `tol`
    /// alone.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimc_core::index_set::IndexSet;
    /// use mimc_estimator::{Estimator, SampleMethod, SampleOutput, SamplingError};
    ///
    /// let sampler = |_: &mimc_core::types::Index, _: &[f64]| {
    ///     Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0))
    /// };
    /// let estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), sampler)
    ///     .option("continuate", true)
    ///     .option("nb_of_tols", 3_usize)
    ///     .option("continuation_mul_factor", 2.0)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(estimator.tolerances(0.1), vec![0.4, 0.2, 0.1]);
    /// ```
    pub fn tolerances(&self, tol: f64) -> Vec<f64> {
        if !self.options.continuate {
            return vec![tol];
        }
        let mul = self.options.continuation_mul_factor;
        (0..self.options.nb_of_tols)
            .rev()
            .map(|k| tol * mul.powi(k as i32))
            .collect()
    }

    fn run_tolerance(&mut self, tol: f64) -> Result<RunOutcome, EstimatorError> {
        let start = Instant::now();
        self.internals.size.reset();
        let mut new_max = self.internals.current_set.is_empty();
        info!(
            tol,
            index_set = self.index_set.label(),
            method = self.method.label(),
            executor = self.executor.name(),
            "starting tolerance"
        );

        loop {
            self.update_index_set(new_max);
            self.warm_up(tol)?;
            self.fit_rates();
            if self.index_set.is_unbiased() {
                self.update_probabilities();
                self.allocate_unbiased(tol)?;
            } else {
                let bias = self.bias();
                self.splitting = allocation::splitting(bias, tol, &self.options);
                self.allocate(tol)?;
            }

            let bias = self.bias();
            let varest = self.varest();
            let size = self.internals.size.current();
            if self.options.verbose {
                info!(tol, size, bias, varest, splitting = self.splitting, "iteration");
            } else {
                debug!(tol, size, bias, varest, splitting = self.splitting, "iteration");
            }

            if self.is_converged(tol, bias, varest) {
                info!(tol, size, rmse = (bias * bias + varest).sqrt(), "tolerance met");
                self.record(tol, true, start.elapsed().as_secs_f64())?;
                return Ok(RunOutcome::Converged { tol });
            }
            if self.is_exhausted() {
                warn!(
                    tol,
                    size,
                    max_index_set_param = self.options.max_index_set_param,
                    rmse = (bias * bias + varest).sqrt(),
                    "index set exhausted before tolerance was met"
                );
                self.record(tol, false, start.elapsed().as_secs_f64())?;
                return Ok(RunOutcome::IndexSetExhausted { tol });
            }
            new_max = self.internals.size.increment();
        }
    }

    /// Brings the current set up to the size parameter. Adaptive sets grow
    /// by one expansion, and only when the size parameter reaches a new
    /// maximum.
    fn update_index_set(&mut self, new_max: bool) {
        if self.index_set.is_adaptive() {
            if self.internals.current_set.is_empty() {
                let initial = self
                    .internals
                    .adaptive()
                    .map(|adaptive| adaptive.current_set())
                    .unwrap_or_default();
                self.internals.extend_current_set(initial);
            } else if new_max {
                self.grow_adaptive();
            }
            return;
        }
        let size = if self.index_set.is_unbiased() {
            self.options.max_index_set_param
        } else {
            self.internals.size.current()
        };
        let indices = self.index_set.enumerate(size);
        self.internals.extend_current_set(indices);
    }

    /// Samples every index of the current set that has no samples yet.
    fn warm_up(&mut self, tol: f64) -> Result<(), EstimatorError> {
        let fresh: Vec<Index> = self
            .internals
            .current_set
            .iter()
            .filter(|index| self.internals.nb_of_samples(index) == 0)
            .cloned()
            .collect();
        if fresh.is_empty() {
            return Ok(());
        }
        let requests: Vec<(Index, usize)> = fresh
            .into_iter()
            .map(|index| {
                let count = self.warm_up_count(&index, tol);
                (index, count)
            })
            .collect();
        debug!(indices = requests.len(), "warming up new indices");
        self.sample_batch(&requests)
    }

    /// Warm-up batch size for a new index.
    ///
    /// With regression enabled, a non-root Monte Carlo index receives the
    /// optimal count predicted by the fitted variance and cost models,
    /// clamped to `[2, nb_of_warm_up_samples]`.
    fn warm_up_count(&self, index: &Index, tol: f64) -> usize {
        let warm_up = self.options.nb_of_warm_up_samples;
        let predicts = self.options.do_regression
            && !self.method.is_qmc()
            && !index.is_zero()
            && self.rates.variance.is_fitted()
            && self.rates.cost.is_fitted();
        if !predicts {
            return warm_up;
        }
        let v = self.rates.variance.predict(index);
        let c = self.rates.cost.predict(index);
        let qoi = self.controlling_qoi();
        let existing: f64 = self
            .index_statistics(qoi)
            .iter()
            .map(|s| (s.variance.max(0.0) * s.cost).sqrt())
            .sum();
        let budget = self.splitting * tol * tol;
        let optimal = (v / c).sqrt() * (existing + (v * c).sqrt()) / budget;
        if !optimal.is_finite() {
            return warm_up;
        }
        let cap = warm_up.max(2);
        if optimal >= cap as f64 {
            return cap;
        }
        (optimal.ceil() as usize).max(2)
    }

    fn is_converged(&self, tol: f64, bias: f64, varest: f64) -> bool {
        if bias * bias + varest > tol * tol {
            return false;
        }
        let bounded_biased = self.index_set.is_bounded() && self.index_set.has_bias();
        !bounded_biased || self.internals.size.current() >= self.options.min_index_set_param
    }

    fn is_exhausted(&self) -> bool {
        if self.internals.size.current() >= self.options.max_index_set_param {
            return true;
        }
        self.internals
            .adaptive()
            .map_or(false, |adaptive| adaptive.is_exhausted())
    }

    /// Appends a snapshot to the history and hands it to the store.
    fn record(&mut self, tol: f64, converged: bool, elapsed: f64) -> Result<(), EstimatorError> {
        let qoi = self.controlling_qoi();
        let bias = self.bias();
        let varest = self.varest();
        let mse = bias * bias + varest;
        let indices = self
            .index_statistics(qoi)
            .into_iter()
            .map(|s| IndexRecord {
                index: s.index,
                nb_of_samples: s.nb_of_samples,
                mean: s.mean,
                variance: s.variance,
                varest: s.varest,
                cost: s.cost,
            })
            .collect();
        let record = HistoryRecord {
            tol,
            converged,
            elapsed,
            timestamp: chrono::Utc::now().to_rfc3339(),
            index_set: self.index_set.label().to_string(),
            sample_method: self.method.label().to_string(),
            size_param: self.internals.size.current(),
            current_index_set: self.internals.current_set.iter().cloned().collect(),
            mean: self.mean(),
            varest,
            bias,
            mse,
            rmse: mse.sqrt(),
            splitting: self.splitting,
            rates: RateSummary {
                alpha: self.rates.alpha(),
                beta: self.rates.beta(),
                gamma: self.rates.gamma(),
            },
            total_work: self.total_work(),
            total_time: self.total_time(),
            seed: self.seed(),
            indices,
        };
        self.history.push(record);
        if let Some(store) = &self.store {
            store.persist(&self.history)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplingError;
    use crate::estimator::statistics::{RateModel, Rates};
    use crate::sample_method::SampleMethod;
    use crate::sampler::SampleOutput;
    use mimc_core::index_set::IndexSet;
    use mimc_core::math::Uncertainty;

    fn constant(_: &Index, _: &[f64]) -> Result<SampleOutput, SamplingError> {
        Ok(SampleOutput::scalar(2.0, 2.0))
    }

    #[test]
    fn test_invalid_tolerance_is_rejected() {
        let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), constant)
            .build()
            .unwrap();
        for tol in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                estimator.run(tol),
                Err(EstimatorError::InvalidTolerance(_))
            ));
        }
        assert!(estimator.history().is_empty());
    }

    #[test]
    fn test_zero_variance_converges_after_warm_up() {
        let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), constant)
            .option("nb_of_warm_up_samples", 5_usize)
            .build()
            .unwrap();
        let outcome = estimator.run(1e-3).unwrap();
        assert_eq!(outcome, RunOutcome::Converged { tol: 1e-3 });
        assert_eq!(estimator.nb_of_samples(&Index::zero(1)), 5);
        assert_eq!(estimator.mean(), vec![2.0]);
        assert_eq!(estimator.history().len(), 1);
        assert!(estimator.history()[0].converged);
    }

    #[test]
    fn test_bounded_set_exhaustion_is_reported() {
        // the difference never decays, so the bias never shrinks
        let sampler = |_: &Index, _: &[f64]| Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0));
        let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
            .option("max_index_set_param", 3_usize)
            .option("min_index_set_param", 0_usize)
            .build()
            .unwrap();
        let outcome = estimator.run(0.1).unwrap();
        assert_eq!(outcome, RunOutcome::IndexSetExhausted { tol: 0.1 });
        assert_eq!(estimator.current_index_set().len(), 4);
        let record = estimator.history().last().unwrap();
        assert!(!record.converged);
        assert_eq!(record.size_param, 3);
    }

    #[test]
    fn test_continuation_stops_at_first_failure() {
        let sampler = |_: &Index, _: &[f64]| Ok::<_, SamplingError>(SampleOutput::scalar(1.0, 1.0));
        let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
            .option("max_index_set_param", 2_usize)
            .option("continuate", true)
            .option("nb_of_tols", 4_usize)
            .build()
            .unwrap();
        let outcome = estimator.run(0.1).unwrap();
        assert!(!outcome.is_converged());
        assert_eq!(estimator.history().len(), 1);
    }

    #[test]
    fn test_min_index_set_param_delays_convergence() {
        // exact zero differences above the root
        let sampler = |index: &Index, inputs: &[f64]| {
            let d = if index.is_zero() { 1.0 + inputs[0] } else { 0.0 };
            Ok::<_, SamplingError>(SampleOutput::scalar(d, 1.0 + inputs[0]))
        };
        let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), sampler)
            .distributions(vec![Uncertainty::standard_normal()])
            .option("seed", 9_usize)
            .option("min_index_set_param", 3_usize)
            .build()
            .unwrap();
        assert!(estimator.run(0.1).unwrap().is_converged());
        assert_eq!(estimator.history().last().unwrap().size_param, 3);
    }

    #[test]
    fn test_regression_warm_up_is_capped() {
        let mut estimator = Estimator::builder(IndexSet::ml(), SampleMethod::mc(), constant)
            .option("nb_of_warm_up_samples", 7_usize)
            .build()
            .unwrap();
        let flat = |y: f64| {
            RateModel::fit(&[(Index::from([1]), y), (Index::from([2]), y)], 1, -1.0)
        };
        // V / C = 1e200 puts the optimal count far beyond usize
        estimator.rates = Rates {
            mean: flat(1.0),
            variance: flat(1e100),
            cost: flat(1e-100),
        };
        assert!(estimator.rates.variance.is_fitted());
        assert_eq!(estimator.warm_up_count(&Index::from([3]), 1e-3), 7);
        // the root always gets the fixed warm-up
        assert_eq!(estimator.warm_up_count(&Index::zero(1), 1e-3), 7);
    }

    #[test]
    fn test_record_carries_snapshot() {
        let mut estimator = Estimator::builder(IndexSet::sl(), SampleMethod::mc(), constant)
            .option("seed", 4_usize)
            .build()
            .unwrap();
        estimator.run(0.5).unwrap();
        let record = estimator.history().last().unwrap();
        assert_eq!(record.index_set, "SL");
        assert_eq!(record.sample_method, "MC");
        assert_eq!(record.seed, 4);
        assert_eq!(record.current_index_set, vec![Index::zero(1)]);
        assert_eq!(record.indices.len(), 1);
        assert_eq!(estimator.history().latest_field("converged"), Some(serde_json::json!(true)));
    }
}
