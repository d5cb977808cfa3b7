//! Streaming moments.

/// Streaming mean and variance (Welford's algorithm).
///
/// Supports merging two partial accumulations (Chan et al.), so batches
/// computed elsewhere can be folded in without revisiting their samples.
///
/// # Examples
///
/// ```
/// use mimc_core::math::RunningMoments;
///
/// let mut moments = RunningMoments::new();
/// for x in [1.0, 2.0, 3.0, 4.0] {
///     moments.push(x);
/// }
/// assert_eq!(moments.count(), 4);
/// assert!((moments.mean() - 2.5).abs() < 1e-12);
/// assert!((moments.variance() - 5.0 / 3.0).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RunningMoments {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningMoments {
    /// Empty accumulator.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one observation.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Folds another accumulation into this one.
    pub fn merge(&mut self, other: &RunningMoments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
    }

    /// Number of observations.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Sample mean, zero when empty.
    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance, zero with fewer than two observations.
    #[inline]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }
}

/// Unbiased sample variance of a slice, zero with fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let mut moments = RunningMoments::new();
    values.iter().for_each(|&x| moments.push(x));
    moments.variance()
}
