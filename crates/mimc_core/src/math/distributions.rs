//! Input distributions of the random model parameters.

use serde::{Deserialize, Serialize};

/// Smallest distance from 0 and 1 accepted by [`inverse_normal_cdf`].
const UNIT_CLAMP: f64 = 1e-12;

/// Marginal distribution of one uncertain model input.
///
/// Monte Carlo draws samples directly; quasi-Monte Carlo maps points of the
/// unit cube through [`Uncertainty::from_unit`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Uncertainty {
    /// Uniform on `[lower, upper)`.
    Uniform {
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },
    /// Normal with the given mean and standard deviation.
    Normal {
        /// Mean.
        mean: f64,
        /// Standard deviation.
        std_dev: f64,
    },
}

impl Uncertainty {
    /// Standard normal `N(0, 1)`.
    pub fn standard_normal() -> Self {
        Uncertainty::Normal {
            mean: 0.0,
            std_dev: 1.0,
        }
    }

    /// Uniform on the unit interval.
    pub fn unit_uniform() -> Self {
        Uncertainty::Uniform {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// `true` if the parameters describe a proper distribution.
    pub fn is_valid(&self) -> bool {
        match *self {
            Uncertainty::Uniform { lower, upper } => {
                lower.is_finite() && upper.is_finite() && lower < upper
            }
            Uncertainty::Normal { mean, std_dev } => {
                mean.is_finite() && std_dev.is_finite() && std_dev >= 0.0
            }
        }
    }

    /// Maps `u ∈ (0, 1)` to the distribution by inverse transform.
    ///
    /// # Examples
    ///
    /// ```
    /// use mimc_core::math::Uncertainty;
    ///
    /// let uniform = Uncertainty::Uniform { lower: -1.0, upper: 1.0 };
    /// assert_eq!(uniform.from_unit(0.75), 0.5);
    ///
    /// let normal = Uncertainty::Normal { mean: 2.0, std_dev: 3.0 };
    /// assert!((normal.from_unit(0.5) - 2.0).abs() < 1e-9);
    /// ```
    pub fn from_unit(&self, u: f64) -> f64 {
        match *self {
            Uncertainty::Uniform { lower, upper } => lower + (upper - lower) * u,
            Uncertainty::Normal { mean, std_dev } => mean + std_dev * inverse_normal_cdf(u),
        }
    }

    /// Maps a standard normal variate to the distribution.
    ///
    /// Used by Monte Carlo input generation for normal inputs; uniform inputs
    /// go through [`Uncertainty::from_unit`] instead.
    pub fn from_standard_normal(&self, z: f64) -> f64 {
        match *self {
            Uncertainty::Uniform { .. } => self.from_unit(standard_normal_cdf(z)),
            Uncertainty::Normal { mean, std_dev } => mean + std_dev * z,
        }
    }
}

/// Inverse of the standard normal CDF (Beasley-Springer-Moro).
///
/// The argument is clamped to `[1e-12, 1 - 1e-12]`, so the result is always
/// finite.
///
/// # Examples
///
/// ```
/// use mimc_core::math::inverse_normal_cdf;
///
/// assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
/// assert!((inverse_normal_cdf(0.975) - 1.959964).abs() < 1e-4);
/// assert!(inverse_normal_cdf(0.0).is_finite());
/// ```
pub fn inverse_normal_cdf(u: f64) -> f64 {
    const A: [f64; 4] = [
        2.50662823884,
        -18.61500062529,
        41.39119773534,
        -25.44106049637,
    ];
    const B: [f64; 4] = [
        -8.47351093090,
        23.08336743743,
        -21.06224101826,
        3.13082909833,
    ];
    const C: [f64; 9] = [
        0.3374754822726147,
        0.9761690190917186,
        0.1607979714918209,
        0.0276438810333863,
        0.0038405729373609,
        0.0003951896511919,
        0.0000321767881768,
        0.0000002888167364,
        0.0000003960315187,
    ];

    let u = if u.is_nan() {
        0.5
    } else {
        u.clamp(UNIT_CLAMP, 1.0 - UNIT_CLAMP)
    };
    let y = u - 0.5;

    if y.abs() < 0.42 {
        let r = y * y;
        let numer = A[0] + r * (A[1] + r * (A[2] + r * A[3]));
        let denom = 1.0 + r * (B[0] + r * (B[1] + r * (B[2] + r * B[3])));
        return y * numer / denom;
    }

    let r = if y < 0.0 { u } else { 1.0 - u };
    let s = (-r.ln()).ln();
    let x = C
        .iter()
        .rev()
        .fold(0.0, |acc, &c| acc * s + c);
    if y < 0.0 {
        -x
    } else {
        x
    }
}

/// Standard normal CDF via the complementary error function approximation
/// of Abramowitz and Stegun (7.1.26), accurate to about 1e-7.
pub fn standard_normal_cdf(z: f64) -> f64 {
    let x = z.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = t
        * (0.254829592
            + t * (-0.284496736 + t * (1.421413741 + t * (-1.453152027 + t * 1.061405429))));
    let erfc = poly * (-x * x).exp();
    if z >= 0.0 {
        1.0 - 0.5 * erfc
    } else {
        0.5 * erfc
    }
}
