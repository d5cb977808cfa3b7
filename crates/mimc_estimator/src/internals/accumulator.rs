//! Per-index sample accumulators.

use crate::sampler::SampleOutput;
use mimc_core::math::RunningMoments;

/// Streaming accumulator for one stream of samples, optionally retaining the
/// raw values.
///
/// When samples are retained, the buffer length always equals
/// [`Accumulator::count`].
#[derive(Clone, Debug, Default)]
pub struct Accumulator {
    moments: RunningMoments,
    samples: Option<Vec<f64>>,
}

impl Accumulator {
    /// Creates an empty accumulator.
    pub fn new(retain_samples: bool) -> Self {
        Self {
            moments: RunningMoments::new(),
            samples: retain_samples.then(Vec::new),
        }
    }

    /// Adds one sample.
    #[inline]
    pub fn push(&mut self, x: f64) {
        self.moments.push(x);
        if let Some(samples) = &mut self.samples {
            samples.push(x);
        }
    }

    /// Number of samples.
    #[inline]
    pub fn count(&self) -> usize {
        self.moments.count()
    }

    /// Sample mean (0 when empty).
    #[inline]
    pub fn mean(&self) -> f64 {
        self.moments.mean()
    }

    /// Unbiased sample variance (0 with fewer than two samples).
    #[inline]
    pub fn variance(&self) -> f64 {
        self.moments.variance()
    }

    /// Streaming moments.
    #[inline]
    pub fn moments(&self) -> &RunningMoments {
        &self.moments
    }

    /// Retained samples, if retention is enabled.
    pub fn samples(&self) -> Option<&[f64]> {
        self.samples.as_deref()
    }
}

/// Pooled moments of several shift accumulators.
pub fn pooled(shifts: &[Accumulator]) -> RunningMoments {
    let mut pooled = RunningMoments::new();
    for shift in shifts {
        pooled.merge(shift.moments());
    }
    pooled
}

/// All data recorded at one index.
///
/// `diff[q][r]` and `value[q][r]` accumulate quantity of interest `q` for
/// shift `r`. Every shift holds the same number of samples once a batch has
/// been merged.
#[derive(Clone, Debug)]
pub struct IndexAccumulators {
    diff: Vec<Vec<Accumulator>>,
    value: Vec<Vec<Accumulator>>,
    work: f64,
    time: f64,
}

impl IndexAccumulators {
    /// Empty accumulators for `nb_of_qoi` quantities and `nb_of_shifts`
    /// shifts.
    pub fn new(nb_of_qoi: usize, nb_of_shifts: usize, retain_samples: bool) -> Self {
        let grid = || vec![vec![Accumulator::new(retain_samples); nb_of_shifts]; nb_of_qoi];
        Self {
            diff: grid(),
            value: grid(),
            work: 0.0,
            time: 0.0,
        }
    }

    /// Records one sample of shift `shift` with its cost and wall time.
    pub fn push(&mut self, shift: usize, output: &SampleOutput, cost: f64, elapsed: f64) {
        for (q, (&d, &v)) in output.difference.iter().zip(&output.value).enumerate() {
            self.diff[q][shift].push(d);
            self.value[q][shift].push(v);
        }
        self.work += cost;
        self.time += elapsed;
    }

    /// Number of samples per shift.
    #[inline]
    pub fn nb_of_samples(&self) -> usize {
        self.diff
            .first()
            .and_then(|shifts| shifts.first())
            .map_or(0, Accumulator::count)
    }

    /// Number of shifts.
    #[inline]
    pub fn nb_of_shifts(&self) -> usize {
        self.diff.first().map_or(0, Vec::len)
    }

    /// Total number of sampler evaluations (all shifts).
    pub fn nb_of_evaluations(&self) -> usize {
        self.diff
            .first()
            .map_or(0, |shifts| shifts.iter().map(Accumulator::count).sum())
    }

    /// Difference accumulators of quantity `qoi`, one per shift.
    #[inline]
    pub fn diff(&self, qoi: usize) -> &[Accumulator] {
        &self.diff[qoi]
    }

    /// Value accumulators of quantity `qoi`, one per shift.
    #[inline]
    pub fn value(&self, qoi: usize) -> &[Accumulator] {
        &self.value[qoi]
    }

    /// Mean difference of quantity `qoi` over all shifts.
    pub fn mean(&self, qoi: usize) -> f64 {
        pooled(&self.diff[qoi]).mean()
    }

    /// Mean non-differenced value of quantity `qoi` over all shifts.
    pub fn value_mean(&self, qoi: usize) -> f64 {
        pooled(&self.value[qoi]).mean()
    }

    /// Per-sample variance of the differences of quantity `qoi`, pooled over
    /// shifts.
    pub fn sample_variance(&self, qoi: usize) -> f64 {
        pooled(&self.diff[qoi]).variance()
    }

    /// Accumulated cost.
    #[inline]
    pub fn work(&self) -> f64 {
        self.work
    }

    /// Accumulated wall-clock time in seconds.
    #[inline]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Average cost of one evaluation, `None` before the first sample.
    pub fn cost_per_sample(&self) -> Option<f64> {
        match self.nb_of_evaluations() {
            0 => None,
            n => Some(self.work / n as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_retained_buffer_matches_count() {
        let mut acc = Accumulator::new(true);
        for x in [1.0, 2.0, 4.0] {
            acc.push(x);
        }
        assert_eq!(acc.samples().map(<[f64]>::len), Some(acc.count()));
        assert!(Accumulator::new(false).samples().is_none());
    }

    #[test]
    fn test_index_accumulators() {
        let mut acc = IndexAccumulators::new(2, 2, false);
        assert_eq!(acc.nb_of_samples(), 0);
        assert_eq!(acc.cost_per_sample(), None);

        for k in 0..4 {
            let x = k as f64;
            let out = SampleOutput::new(vec![x, -x], vec![x + 1.0, 0.0]);
            acc.push(k % 2, &out, 2.0, 0.1);
        }
        assert_eq!(acc.nb_of_samples(), 2);
        assert_eq!(acc.nb_of_shifts(), 2);
        assert_eq!(acc.nb_of_evaluations(), 4);
        assert_relative_eq!(acc.mean(0), 1.5, epsilon = 1e-12);
        assert_relative_eq!(acc.mean(1), -1.5, epsilon = 1e-12);
        assert_relative_eq!(acc.value_mean(0), 2.5, epsilon = 1e-12);
        assert_relative_eq!(acc.sample_variance(0), 5.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(acc.cost_per_sample().unwrap(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(acc.time(), 0.4, epsilon = 1e-12);
    }
}
