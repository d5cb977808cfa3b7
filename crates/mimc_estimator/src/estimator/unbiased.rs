//! Randomised single-term unbiased estimator.
//!
//! Each sample picks one index `α` of the inner set with probability `p_α`
//! and records `ΔQ_α / p_α`, whose expectation is `Σ_α E[ΔQ_α]`. The
//! probabilities follow `p_α ∝ sqrt(E[ΔQ_α²] / C_α)`, floored so that every
//! index stays reachable.

use super::allocation;
use super::statistics::COST_FLOOR;
use super::Estimator;
use crate::error::EstimatorError;
use crate::executor::SampleJob;
use crate::sample_method::capped_count;
use crate::sampler::Sampler;
use tracing::debug;

/// Probability floor, relative to the uniform probability `1/n`.
const PROBABILITY_FLOOR: f64 = 0.01;

/// Upper bound on allocation rounds per iteration.
const MAX_UNBIASED_ROUNDS: usize = 50;

/// Normalises non-negative weights into probabilities with a floor of
/// `PROBABILITY_FLOOR / n`; falls back to uniform probabilities when every
/// weight vanishes.
pub(crate) fn floored_probabilities(weights: &[f64]) -> Vec<f64> {
    let n = weights.len();
    if n == 0 {
        return Vec::new();
    }
    let weights: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 })
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        return vec![1.0 / n as f64; n];
    }
    let floor = PROBABILITY_FLOOR / n as f64;
    let floored: Vec<f64> = weights.iter().map(|w| (w / total).max(floor)).collect();
    let total: f64 = floored.iter().sum();
    floored.iter().map(|p| p / total).collect()
}

impl<S: Sampler> Estimator<S> {
    /// Recomputes the selection probabilities from the per-index statistics
    /// of the inner set.
    pub(crate) fn update_probabilities(&mut self) {
        let qoi = self.controlling_qoi();
        let stats = self.index_statistics(qoi);
        let weights: Vec<f64> = stats
            .iter()
            .map(|s| ((s.variance + s.mean * s.mean) / s.cost.max(COST_FLOOR)).sqrt())
            .collect();
        let probabilities = floored_probabilities(&weights);
        if let Some(state) = self.internals.unbiased.as_mut() {
            state.probabilities = stats
                .into_iter()
                .map(|s| s.index)
                .zip(probabilities)
                .collect();
        }
    }

    /// Draws `count` randomised single-term samples.
    ///
    /// Each sample is also merged into the accumulators of the index it
    /// picked, so the per-index statistics keep improving.
    pub(crate) fn sample_unbiased(&mut self, count: usize) -> Result<(), EstimatorError> {
        let probabilities = match self.internals.unbiased() {
            Some(state) if !state.probabilities.is_empty() => state.probabilities.clone(),
            _ => return Ok(()),
        };
        let weights: Vec<f64> = probabilities.iter().map(|(_, p)| *p).collect();

        let mut jobs: Vec<SampleJob> = Vec::with_capacity(count);
        let mut picked = Vec::with_capacity(count);
        for _ in 0..count {
            let k = match self.internals.rng.choose_weighted(&weights) {
                Some(k) => k,
                None => return Ok(()),
            };
            let (index, p) = &probabilities[k];
            self.push_jobs(&mut jobs, index, 0, 1);
            picked.push(*p);
        }

        let records = self.execute(&jobs)?;
        for (record, p) in records.iter().zip(picked) {
            self.merge(record);
            if let Some(state) = self.internals.unbiased.as_mut() {
                for (acc, d) in state.global.iter_mut().zip(&record.output.difference) {
                    acc.push(d / p);
                }
            }
        }
        Ok(())
    }

    /// Draws global samples until the estimator variance fits `θ·tol²`.
    ///
    /// The bias of this estimator is zero, so `θ` is the splitting at zero
    /// bias.
    pub(crate) fn allocate_unbiased(&mut self, tol: f64) -> Result<(), EstimatorError> {
        self.splitting = allocation::splitting(0.0, tol, &self.options);
        let budget = self.splitting * tol * tol;
        for _ in 0..MAX_UNBIASED_ROUNDS {
            let (n, variance) = match self.internals.unbiased() {
                Some(state) => {
                    let qoi = self.controlling_qoi();
                    (state.nb_of_samples(), state.global[qoi].variance())
                }
                None => return Ok(()),
            };
            let target = if n < self.options.nb_of_warm_up_samples {
                self.options.nb_of_warm_up_samples
            } else {
                capped_count(variance / budget)
            };
            if target <= n {
                return Ok(());
            }
            self.sample_unbiased(target - n)?;
        }
        debug!(rounds = MAX_UNBIASED_ROUNDS, "unbiased allocation round limit reached");
        Ok(())
    }
}
