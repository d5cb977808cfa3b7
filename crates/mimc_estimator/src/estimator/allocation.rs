//! Splitting of the tolerance budget and sample allocation.
//!
//! With per-sample variances `V_i` and costs `C_i`, the allocation
//! minimising `Σ N_i C_i` subject to `Σ V_i / N_i = B` is
//!
//! ```text
//! N_i = sqrt(V_i / C_i) · Σ_j sqrt(V_j C_j) / B
//! ```

use super::statistics::COST_FLOOR;
use super::Estimator;
use crate::config::EstimatorOptions;
use crate::error::EstimatorError;
use crate::sampler::Sampler;
use mimc_core::types::Index;
use tracing::debug;

/// Splitting used when MSE splitting is disabled (before clamping).
pub const DEFAULT_SPLITTING: f64 = 0.5;

/// Upper bound on Monte Carlo allocation rounds per iteration.
const MAX_ALLOCATION_ROUNDS: usize = 50;

/// Upper bound on quasi-Monte Carlo growth steps per iteration.
const MAX_QMC_ROUNDS: usize = 200;

/// Optimal (real-valued) sample counts for a variance budget.
///
/// Indices with zero variance get zero samples. Costs are floored at a small
/// positive value.
///
/// # Examples
///
/// ```
/// use mimc_estimator::estimator::allocation::optimal_allocation;
///
/// let n = optimal_allocation(&[1.0, 0.25], &[1.0, 4.0], 0.01);
/// // Σ sqrt(V C) = 2, so N_0 = 1 · 2 / 0.01 and N_1 = 0.25 · 2 / 0.01
/// assert!((n[0] - 200.0).abs() < 1e-9);
/// assert!((n[1] - 50.0).abs() < 1e-9);
/// ```
pub fn optimal_allocation(variances: &[f64], costs: &[f64], budget: f64) -> Vec<f64> {
    let guarded = |v: f64, c: f64| (v.max(0.0), c.max(COST_FLOOR));
    let total: f64 = variances
        .iter()
        .zip(costs)
        .map(|(&v, &c)| {
            let (v, c) = guarded(v, c);
            (v * c).sqrt()
        })
        .sum();
    variances
        .iter()
        .zip(costs)
        .map(|(&v, &c)| {
            let (v, c) = guarded(v, c);
            if v == 0.0 || !(budget > 0.0) {
                0.0
            } else {
                (v / c).sqrt() * total / budget
            }
        })
        .collect()
}

/// Splitting parameter `θ`: the share of `tol²` granted to the statistical
/// error.
///
/// With MSE splitting, `θ = 1 - bias²/tol²`; otherwise the fixed
/// [`DEFAULT_SPLITTING`]. Either way the result is clamped to
/// `[min_splitting, max_splitting]`.
pub fn splitting(bias: f64, tol: f64, options: &EstimatorOptions) -> f64 {
    let theta = if options.do_mse_splitting {
        1.0 - (bias * bias) / (tol * tol)
    } else {
        DEFAULT_SPLITTING
    };
    let theta = if theta.is_finite() {
        theta
    } else {
        options.min_splitting
    };
    theta.clamp(options.min_splitting, options.max_splitting)
}

/// Splitting before any bias is known.
pub fn default_splitting(options: &EstimatorOptions) -> f64 {
    DEFAULT_SPLITTING.clamp(options.min_splitting, options.max_splitting)
}

impl<S: Sampler> Estimator<S> {
    /// Draws samples until the estimator variance of the current index set
    /// fits the budget `θ·tol²`.
    pub(crate) fn allocate(&mut self, tol: f64) -> Result<(), EstimatorError> {
        let budget = self.splitting * tol * tol;
        if self.method.is_qmc() {
            self.allocate_qmc(budget)
        } else {
            self.allocate_mc(budget)
        }
    }

    fn allocate_mc(&mut self, budget: f64) -> Result<(), EstimatorError> {
        for _ in 0..MAX_ALLOCATION_ROUNDS {
            let qoi = self.controlling_qoi();
            let stats = self.index_statistics(qoi);
            let variances: Vec<f64> = stats.iter().map(|s| s.variance).collect();
            let costs: Vec<f64> = stats.iter().map(|s| s.cost).collect();
            let optimal = optimal_allocation(&variances, &costs, budget);

            let requests: Vec<(Index, usize)> = stats
                .iter()
                .zip(&optimal)
                .filter_map(|(s, &n)| {
                    let extra = self.method.required_samples(
                        s.nb_of_samples,
                        n,
                        self.options.sample_mul_factor,
                    );
                    (extra > 0).then(|| (s.index.clone(), extra))
                })
                .collect();
            if requests.is_empty() {
                return Ok(());
            }
            self.sample_batch(&requests)?;
        }
        debug!(rounds = MAX_ALLOCATION_ROUNDS, "allocation round limit reached");
        Ok(())
    }

    fn allocate_qmc(&mut self, budget: f64) -> Result<(), EstimatorError> {
        let nb_of_shifts = self.method.nb_of_shifts() as f64;
        for _ in 0..MAX_QMC_ROUNDS {
            let qoi = self.controlling_qoi();
            let stats = self.index_statistics(qoi);
            let total: f64 = stats.iter().map(|s| s.varest).sum();
            if total <= budget {
                return Ok(());
            }
            let score = |s: &&super::IndexStatistics| {
                s.varest / (s.cost * s.nb_of_samples.max(1) as f64 * nb_of_shifts)
            };
            let target = match stats.iter().max_by(|a, b| score(a).total_cmp(&score(b))) {
                Some(target) => target,
                None => return Ok(()),
            };
            let extra = self.method.required_samples(
                target.nb_of_samples,
                0.0,
                self.options.sample_mul_factor,
            );
            self.sample_batch(&[(target.index.clone(), extra)])?;
        }
        debug!(rounds = MAX_QMC_ROUNDS, "QMC growth limit reached");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_allocation_meets_budget() {
        let variances = [1.0, 0.25, 0.0625];
        let costs = [1.0, 2.0, 4.0];
        let budget = 1e-3;
        let n = optimal_allocation(&variances, &costs, budget);
        let achieved: f64 = variances.iter().zip(&n).map(|(v, n)| v / n).sum();
        assert_relative_eq!(achieved, budget, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_variance_gets_no_samples() {
        let n = optimal_allocation(&[1.0, 0.0], &[1.0, 1.0], 0.1);
        assert_eq!(n[1], 0.0);
        assert_relative_eq!(n[0], 10.0, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_cost_is_guarded() {
        let n = optimal_allocation(&[1.0, 1.0], &[0.0, 1.0], 0.1);
        assert!(n.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_splitting_clamped() {
        let options = EstimatorOptions::default();
        assert_relative_eq!(splitting(0.0, 1.0, &options), 0.99);
        assert_relative_eq!(splitting(0.9, 1.0, &options), 0.5);
        assert_relative_eq!(splitting(0.6, 1.0, &options), 0.64, max_relative = 1e-12);

        let fixed = EstimatorOptions {
            do_mse_splitting: false,
            min_splitting: 0.6,
            ..EstimatorOptions::default()
        };
        assert_relative_eq!(splitting(0.0, 1.0, &fixed), 0.6);
        assert_relative_eq!(default_splitting(&EstimatorOptions::default()), 0.5);
    }
}
