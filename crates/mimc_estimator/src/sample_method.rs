//! Sample-method strategies: Monte Carlo and randomised quasi-Monte Carlo.

use crate::internals::accumulator::{pooled, Accumulator};
use mimc_core::config::{ConfigError, OptionValue};
use mimc_core::math::sample_variance;
use tracing::warn;

/// Default number of random shifts for quasi-Monte Carlo.
pub const DEFAULT_NB_OF_SHIFTS: usize = 10;

/// Upper bound on the samples per shift requested at one index in a single
/// allocation step.
pub const MAX_SAMPLES_PER_INDEX: usize = u32::MAX as usize;

/// Keys recognised by the quasi-Monte Carlo method.
pub const QMC_KEYS: &[&str] = &["nb_of_shifts"];

/// How samples are drawn at an index and how the estimator variance is
/// obtained from them.
///
/// # Examples
///
/// ```
/// use mimc_estimator::SampleMethod;
///
/// let mc = SampleMethod::mc();
/// assert_eq!(mc.nb_of_shifts(), 1);
/// assert_eq!(mc.required_samples(100, 250.3, 2.0), 151);
///
/// let qmc = SampleMethod::qmc();
/// assert_eq!(qmc.nb_of_shifts(), 10);
/// assert_eq!(qmc.required_samples(16, 0.0, 2.0), 16);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SampleMethod {
    /// Plain Monte Carlo: one stream of independent samples per index.
    MonteCarlo,
    /// Randomly shifted low-discrepancy point sets; the spread of the shift
    /// means gives the estimator variance.
    QuasiMonteCarlo {
        /// Number of independent random shifts.
        nb_of_shifts: usize,
    },
}

impl SampleMethod {
    /// Monte Carlo.
    pub fn mc() -> Self {
        SampleMethod::MonteCarlo
    }

    /// Quasi-Monte Carlo with the default number of shifts.
    pub fn qmc() -> Self {
        SampleMethod::QuasiMonteCarlo {
            nb_of_shifts: DEFAULT_NB_OF_SHIFTS,
        }
    }

    /// Short label.
    pub fn label(&self) -> &'static str {
        match self {
            SampleMethod::MonteCarlo => "MC",
            SampleMethod::QuasiMonteCarlo { .. } => "QMC",
        }
    }

    /// `true` for quasi-Monte Carlo.
    #[inline]
    pub fn is_qmc(&self) -> bool {
        matches!(self, SampleMethod::QuasiMonteCarlo { .. })
    }

    /// Number of independent replicates drawn at each index.
    #[inline]
    pub fn nb_of_shifts(&self) -> usize {
        match self {
            SampleMethod::MonteCarlo => 1,
            SampleMethod::QuasiMonteCarlo { nb_of_shifts } => *nb_of_shifts,
        }
    }

    /// Option keys recognised by this method.
    pub fn recognised_keys(&self) -> &'static [&'static str] {
        match self {
            SampleMethod::MonteCarlo => &[],
            SampleMethod::QuasiMonteCarlo { .. } => QMC_KEYS,
        }
    }

    /// Applies a method-specific option.
    pub fn apply_option(&mut self, key: &str, value: &OptionValue) -> Result<(), ConfigError> {
        match (self, key) {
            (SampleMethod::QuasiMonteCarlo { nb_of_shifts }, "nb_of_shifts") => {
                let shifts = value.as_usize(key)?;
                if shifts < 2 {
                    return Err(ConfigError::invalid_value(
                        key,
                        "at least two shifts are needed to estimate a variance",
                    ));
                }
                *nb_of_shifts = shifts;
                Ok(())
            }
            (method, _) => Err(ConfigError::unknown_option(key, method.recognised_keys())),
        }
    }

    /// Additional samples per shift needed at an index holding `current`
    /// samples per shift.
    ///
    /// Monte Carlo tops up to the optimal count `optimal`. Quasi-Monte Carlo
    /// ignores `optimal` and grows the point count geometrically by
    /// `sample_mul_factor` (always by at least one point).
    pub fn required_samples(&self, current: usize, optimal: f64, sample_mul_factor: f64) -> usize {
        match self {
            SampleMethod::MonteCarlo => {
                if !optimal.is_finite() || optimal <= 0.0 {
                    return 0;
                }
                capped_count(optimal).saturating_sub(current)
            }
            SampleMethod::QuasiMonteCarlo { .. } => {
                let next = capped_count(current as f64 * sample_mul_factor);
                next.max(current + 1) - current
            }
        }
    }

    /// Variance of the estimator of the mean at one index.
    ///
    /// Monte Carlo: per-sample variance over the sample count. Quasi-Monte
    /// Carlo: sample variance of the shift means over the number of shifts.
    pub fn estimate_variance(&self, shifts: &[Accumulator]) -> f64 {
        match self {
            SampleMethod::MonteCarlo => {
                let moments = pooled(shifts);
                match moments.count() {
                    0 => 0.0,
                    n => moments.variance() / n as f64,
                }
            }
            SampleMethod::QuasiMonteCarlo { .. } => {
                if shifts.iter().any(|s| s.count() == 0) {
                    return 0.0;
                }
                let means: Vec<f64> = shifts.iter().map(Accumulator::mean).collect();
                sample_variance(&means) / means.len() as f64
            }
        }
    }
}

/// Rounds a sample count up, capped at [`MAX_SAMPLES_PER_INDEX`]. `NaN` and
/// non-positive counts give zero.
pub(crate) fn capped_count(count: f64) -> usize {
    if count.is_nan() || count <= 0.0 {
        return 0;
    }
    if count <= MAX_SAMPLES_PER_INDEX as f64 {
        return count.ceil() as usize;
    }
    warn!(
        requested = count,
        cap = MAX_SAMPLES_PER_INDEX,
        "sample count exceeds the per-index cap"
    );
    MAX_SAMPLES_PER_INDEX
}
