//! Pseudo-random number generator for Monte Carlo inputs.

use mimc_core::math::Uncertainty;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// Seeded random number generator owned by an estimator.
///
/// Produces Monte Carlo input vectors, random shifts for quasi-Monte Carlo
/// point sets and index selections for the unbiased estimator. The seed is
/// stored so runs can be reproduced.
///
/// # Examples
///
/// ```rust
/// use mimc_estimator::rng::EstimatorRng;
/// use mimc_core::math::Uncertainty;
///
/// let mut rng1 = EstimatorRng::from_seed(12345);
/// let mut rng2 = EstimatorRng::from_seed(12345);
/// assert_eq!(rng1.gen_uniform(), rng2.gen_uniform());
///
/// let mut inputs = vec![0.0; 2];
/// rng1.fill_inputs(&[Uncertainty::standard_normal(), Uncertainty::unit_uniform()], &mut inputs);
/// assert!(inputs[1] >= 0.0 && inputs[1] < 1.0);
/// ```
#[derive(Clone, Debug)]
pub struct EstimatorRng {
    inner: StdRng,
    seed: u64,
}

impl EstimatorRng {
    /// Creates a generator initialised with the given seed.
    #[inline]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Creates a generator with a seed drawn from the thread-local entropy
    /// source. The drawn seed is still reported by [`EstimatorRng::seed`].
    pub fn from_entropy() -> Self {
        Self::from_seed(rand::thread_rng().gen())
    }

    /// Seed used for initialisation.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform value in `[0, 1)`.
    #[inline]
    pub fn gen_uniform(&mut self) -> f64 {
        self.inner.gen()
    }

    /// Standard normal variate.
    #[inline]
    pub fn gen_normal(&mut self) -> f64 {
        StandardNormal.sample(&mut self.inner)
    }

    /// Fills `buffer` with one input vector drawn from `distributions`.
    ///
    /// # Panics
    ///
    /// Panics if the lengths differ.
    pub fn fill_inputs(&mut self, distributions: &[Uncertainty], buffer: &mut [f64]) {
        assert_eq!(distributions.len(), buffer.len(), "input buffer length mismatch");
        for (slot, dist) in buffer.iter_mut().zip(distributions) {
            *slot = match dist {
                Uncertainty::Uniform { .. } => dist.from_unit(self.gen_uniform()),
                Uncertainty::Normal { .. } => dist.from_standard_normal(self.gen_normal()),
            };
        }
    }

    /// Random shift vector in `[0, 1)^dim` for a Cranley-Patterson rotation.
    pub fn gen_shift(&mut self, dim: usize) -> Vec<f64> {
        (0..dim).map(|_| self.gen_uniform()).collect()
    }

    /// Draws a position from unnormalised non-negative `weights`.
    ///
    /// Returns `None` if the weights are empty or sum to zero.
    pub fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();
        if weights.is_empty() || !(total > 0.0) {
            return None;
        }
        let target = self.gen_uniform() * total;
        let mut acc = 0.0;
        for (k, w) in weights.iter().enumerate() {
            acc += w;
            if target < acc {
                return Some(k);
            }
        }
        Some(weights.len() - 1)
    }
}
