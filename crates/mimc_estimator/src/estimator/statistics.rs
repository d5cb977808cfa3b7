//! Per-index statistics, rate fitting and bias estimation.
//!
//! Rates are fitted on a `log2` scale by least squares:
//!
//! ```text
//! log2 |E[ΔQ_α]|   ≈ c_m - Σ_k α_k · index_k
//! log2 Var[ΔQ_α]   ≈ c_v - Σ_k β_k · index_k
//! log2 Cost_α      ≈ c_c + Σ_k γ_k · index_k
//! ```
//!
//! The root index is left out of the mean and variance fits because it
//! carries `Q_0` rather than a difference.

use super::Estimator;
use crate::sampler::Sampler;
use mimc_core::math::least_squares;
use mimc_core::types::Index;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Smallest per-sample cost used in divisions.
pub(crate) const COST_FLOOR: f64 = 1e-12;

/// Smallest mean decay rate used when extrapolating the truncation bias.
pub const MIN_ALPHA: f64 = 0.1;

/// Statistics of the controlling quantity of interest at one index.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexStatistics {
    /// Index.
    pub index: Index,
    /// Samples per shift.
    pub nb_of_samples: usize,
    /// Mean difference.
    pub mean: f64,
    /// Per-sample variance of the differences.
    pub variance: f64,
    /// Variance of the estimator of the mean.
    pub varest: f64,
    /// Average cost of one sample, floored at a small positive value.
    pub cost: f64,
}

/// Log-linear model `log2 y = intercept + Σ_k slope_k · index_k`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateModel {
    intercept: f64,
    slopes: Vec<f64>,
    fitted: bool,
}

impl RateModel {
    /// Model with the given slope in every direction and zero intercept.
    pub fn fixed(dim: usize, slope: f64) -> Self {
        Self {
            intercept: 0.0,
            slopes: vec![slope; dim],
            fitted: false,
        }
    }

    /// Fits the model to `(index, value)` points with positive values.
    ///
    /// A direction is fitted only if the points take at least two distinct
    /// coordinate values along it; otherwise its slope is held at
    /// `default_slope`. If no direction can be fitted, or the fit is
    /// singular, every slope takes the default and only the intercept is
    /// estimated.
    pub fn fit(points: &[(Index, f64)], dim: usize, default_slope: f64) -> Self {
        let points: Vec<(&Index, f64)> = points
            .iter()
            .filter(|(_, y)| y.is_finite() && *y > 0.0)
            .map(|(index, y)| (index, y.log2()))
            .collect();
        if points.is_empty() {
            return Self::fixed(dim, default_slope);
        }

        let free: Vec<usize> = (0..dim)
            .filter(|&k| {
                let values: BTreeSet<usize> = points.iter().map(|(index, _)| index[k]).collect();
                values.len() >= 2
            })
            .collect();

        let adjusted = |fixed: &dyn Fn(usize) -> bool| -> Vec<f64> {
            points
                .iter()
                .map(|(index, y)| {
                    y - (0..dim)
                        .filter(|&k| fixed(k))
                        .map(|k| default_slope * index[k] as f64)
                        .sum::<f64>()
                })
                .collect()
        };

        if !free.is_empty() {
            let y = adjusted(&|k| !free.contains(&k));
            let rows: Vec<Vec<f64>> = points
                .iter()
                .map(|(index, _)| {
                    std::iter::once(1.0)
                        .chain(free.iter().map(|&k| index[k] as f64))
                        .collect()
                })
                .collect();
            match least_squares(&rows, &y) {
                Ok(coefficients) => {
                    let mut slopes = vec![default_slope; dim];
                    for (&k, &c) in free.iter().zip(&coefficients[1..]) {
                        slopes[k] = c;
                    }
                    return Self {
                        intercept: coefficients[0],
                        slopes,
                        fitted: true,
                    };
                }
                Err(e) => debug!(error = %e, "rate regression failed, using default rates"),
            }
        }

        let y = adjusted(&|_| true);
        Self {
            intercept: y.iter().sum::<f64>() / y.len() as f64,
            slopes: vec![default_slope; dim],
            fitted: false,
        }
    }

    /// `true` if at least one slope was estimated from data.
    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    /// Intercept on the `log2` scale.
    #[inline]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Slopes per direction on the `log2` scale.
    #[inline]
    pub fn slopes(&self) -> &[f64] {
        &self.slopes
    }

    /// Predicted `log2` value at `index`.
    pub fn predict_log2(&self, index: &Index) -> f64 {
        self.intercept
            + self
                .slopes
                .iter()
                .zip(index.coords())
                .map(|(s, &c)| s * c as f64)
                .sum::<f64>()
    }

    /// Predicted value at `index`.
    pub fn predict(&self, index: &Index) -> f64 {
        self.predict_log2(index).exp2()
    }
}

/// Fitted decay and growth models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    /// Model of `|E[ΔQ_α]|`.
    pub mean: RateModel,
    /// Model of `Var[ΔQ_α]`.
    pub variance: RateModel,
    /// Model of the per-sample cost.
    pub cost: RateModel,
}

impl Rates {
    /// Default rates: slopes `-alpha`, `-beta` and `gamma` in every
    /// direction.
    pub fn defaults(dim: usize, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            mean: RateModel::fixed(dim, -alpha),
            variance: RateModel::fixed(dim, -beta),
            cost: RateModel::fixed(dim, gamma),
        }
    }

    /// Mean decay rates `α_k`.
    pub fn alpha(&self) -> Vec<f64> {
        self.mean.slopes().iter().map(|s| -s).collect()
    }

    /// Variance decay rates `β_k`.
    pub fn beta(&self) -> Vec<f64> {
        self.variance.slopes().iter().map(|s| -s).collect()
    }

    /// Cost growth rates `γ_k`.
    pub fn gamma(&self) -> Vec<f64> {
        self.cost.slopes().to_vec()
    }
}

impl<S: Sampler> Estimator<S> {
    /// Statistics of quantity `qoi` at every sampled index of the current
    /// set, in index order.
    pub fn index_statistics(&self, qoi: usize) -> Vec<IndexStatistics> {
        self.internals
            .current_set
            .iter()
            .filter_map(|index| {
                let acc = self.internals.accumulators(index)?;
                if acc.nb_of_samples() == 0 {
                    return None;
                }
                Some(IndexStatistics {
                    index: index.clone(),
                    nb_of_samples: acc.nb_of_samples(),
                    mean: acc.mean(qoi),
                    variance: acc.sample_variance(qoi),
                    varest: self.method.estimate_variance(acc.diff(qoi)),
                    cost: acc.cost_per_sample().unwrap_or(0.0).max(COST_FLOOR),
                })
            })
            .collect()
    }

    /// Quantity of interest with the largest estimator variance; it drives
    /// allocation, bias and convergence.
    pub fn controlling_qoi(&self) -> usize {
        let varest = |qoi: usize| -> f64 {
            match self.internals.unbiased() {
                Some(state) => {
                    let acc = &state.global[qoi];
                    match acc.count() {
                        0 => 0.0,
                        n => acc.variance() / n as f64,
                    }
                }
                None => self.index_statistics(qoi).iter().map(|s| s.varest).sum(),
            }
        };
        (0..self.options.nb_of_qoi)
            .map(|qoi| (qoi, varest(qoi)))
            .fold((0, f64::NEG_INFINITY), |best, (qoi, v)| {
                if v > best.1 {
                    (qoi, v)
                } else {
                    best
                }
            })
            .0
    }

    /// Refits the rate models from the current index set.
    ///
    /// Directions without enough distinct sampled coordinates keep the
    /// configured default rates.
    pub fn fit_rates(&mut self) -> &Rates {
        let qoi = self.controlling_qoi();
        let stats = self.index_statistics(qoi);
        let dim = self.index_set.dim();
        let points = |value: fn(&IndexStatistics) -> f64, include_root: bool| -> Vec<(Index, f64)> {
            stats
                .iter()
                .filter(|s| include_root || !s.index.is_zero())
                .map(|s| (s.index.clone(), value(s)))
                .collect()
        };
        self.rates = Rates {
            mean: RateModel::fit(
                &points(|s| s.mean.abs(), false),
                dim,
                -self.options.default_alpha,
            ),
            variance: RateModel::fit(
                &points(|s| s.variance, false),
                dim,
                -self.options.default_beta,
            ),
            cost: RateModel::fit(&points(|s| s.cost, true), dim, self.options.default_gamma),
        };
        &self.rates
    }

    /// Indices whose contributions estimate the truncation bias: the outer
    /// layer of a bounded set, or the active frontier of an adaptive set.
    pub(crate) fn bias_boundary(&self) -> BTreeSet<Index> {
        match self.internals.adaptive() {
            Some(adaptive) => adaptive.active_set().clone(),
            None => self.index_set.outer_boundary(self.internals.size.current()),
        }
    }

    /// Estimated truncation bias of the controlling quantity of interest.
    ///
    /// Zero for single-level and unbiased estimators. The boundary
    /// contributions are extrapolated past the set with the fitted mean
    /// decay: a direction decaying at rate `α_k` leaves a geometric tail of
    /// `1 / (2^α_k - 1)` times the boundary. The default estimate is
    /// `|Σ_boundary mean|` times the tail of the slowest direction. The
    /// conservative estimate takes the larger of `Σ_boundary |mean|` and
    /// the fitted-model predictions over the boundary, times the tails of
    /// every direction summed.
    pub fn bias(&self) -> f64 {
        if !self.index_set.has_bias() {
            return 0.0;
        }
        let qoi = self.controlling_qoi();
        let boundary = self.bias_boundary();
        let means: Vec<f64> = boundary
            .iter()
            .filter_map(|index| {
                let acc = self.internals.accumulators(index)?;
                (acc.nb_of_samples() > 0).then(|| acc.mean(qoi))
            })
            .collect();
        let alpha = self.rates.alpha();

        if !self.options.conservative_bias_estimate {
            return means.iter().sum::<f64>().abs() * truncation_factor(&alpha, false);
        }
        let observed: f64 = means.iter().map(|m| m.abs()).sum();
        let predicted: f64 = if self.rates.mean.is_fitted() {
            boundary
                .iter()
                .filter(|index| !index.is_zero())
                .map(|index| self.rates.mean.predict(index))
                .sum()
        } else {
            0.0
        };
        observed.max(predicted) * truncation_factor(&alpha, true)
    }
}

/// Ratio of the truncated tail to the boundary contribution, for mean decay
/// rates `alpha`.
///
/// Rates are floored at [`MIN_ALPHA`] so a stagnating difference yields a
/// large but finite factor. With `all_directions` the tails of every
/// direction are summed; otherwise only the slowest one counts.
///
/// ```
/// use mimc_estimator::estimator::statistics::truncation_factor;
///
/// // Σ_{j≥1} 2^-j = 1
/// assert!((truncation_factor(&[1.0], false) - 1.0).abs() < 1e-12);
/// assert!((truncation_factor(&[1.0, 2.0], true) - 4.0 / 3.0).abs() < 1e-12);
/// ```
pub fn truncation_factor(alpha: &[f64], all_directions: bool) -> f64 {
    let tail = |a: f64| 1.0 / (a.max(MIN_ALPHA).exp2() - 1.0);
    if all_directions {
        alpha.iter().map(|&a| tail(a)).sum()
    } else {
        alpha
            .iter()
            .map(|&a| tail(a))
            .fold(0.0, f64::max)
    }
}
