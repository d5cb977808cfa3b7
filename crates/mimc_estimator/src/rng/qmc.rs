//! Low-discrepancy sequences for quasi-Monte Carlo sampling.
//!
//! Quasi-Monte Carlo estimators draw their inputs from a Halton sequence
//! randomised by a Cranley-Patterson rotation: every point is shifted by a
//! uniform random vector modulo one. Each random shift yields an unbiased
//! estimator, and the spread across shifts gives the variance estimate.

/// Trait for low-discrepancy sequences used in quasi-Monte Carlo methods.
///
/// Low-discrepancy sequences provide more uniform coverage of the unit
/// hypercube than pseudo-random sequences, often leading to faster
/// convergence in numerical integration problems.
pub trait LowDiscrepancySequence {
    /// Returns the dimensionality of the sequence.
    fn dimension(&self) -> usize;

    /// Advances the sequence and returns the next point.
    ///
    /// # Returns
    ///
    /// A slice of `dimension()` values, each in the interval [0, 1).
    fn next_point(&mut self) -> &[f64];

    /// Resets the sequence to its initial state.
    fn reset(&mut self);

    /// Skips ahead by `n` points in the sequence.
    fn skip(&mut self, n: usize);

    /// Number of points produced since the last reset (skipped points
    /// included).
    fn position(&self) -> usize;
}

/// Halton sequence in the first `dimension` prime bases.
///
/// The point at position `n` has coordinates `φ_{p_k}(n + 1)`, the radical
/// inverse of `n + 1` in base `p_k`; the origin is never produced.
///
/// # Examples
///
/// ```rust
/// use mimc_estimator::rng::{HaltonSequence, LowDiscrepancySequence};
///
/// let mut halton = HaltonSequence::new(2);
/// assert_eq!(halton.next_point(), &[0.5, 1.0 / 3.0]);
/// assert_eq!(halton.next_point(), &[0.25, 2.0 / 3.0]);
/// ```
#[derive(Clone, Debug)]
pub struct HaltonSequence {
    bases: Vec<u64>,
    counter: usize,
    buffer: Vec<f64>,
}

impl HaltonSequence {
    /// Creates a Halton sequence of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            bases: first_primes(dimension),
            counter: 0,
            buffer: vec![0.0; dimension],
        }
    }

    /// Prime bases in use.
    #[inline]
    pub fn bases(&self) -> &[u64] {
        &self.bases
    }
}

impl LowDiscrepancySequence for HaltonSequence {
    #[inline]
    fn dimension(&self) -> usize {
        self.bases.len()
    }

    fn next_point(&mut self) -> &[f64] {
        self.counter += 1;
        let n = self.counter as u64;
        for (slot, &base) in self.buffer.iter_mut().zip(&self.bases) {
            *slot = radical_inverse(n, base);
        }
        &self.buffer
    }

    fn reset(&mut self) {
        self.counter = 0;
    }

    fn skip(&mut self, n: usize) {
        self.counter += n;
    }

    #[inline]
    fn position(&self) -> usize {
        self.counter
    }
}

/// Low-discrepancy sequence with a Cranley-Patterson random shift.
///
/// Each coordinate of the underlying point is shifted and wrapped back into
/// `[0, 1)`.
#[derive(Clone, Debug)]
pub struct ShiftedSequence<L> {
    sequence: L,
    shift: Vec<f64>,
    buffer: Vec<f64>,
}

impl<L: LowDiscrepancySequence> ShiftedSequence<L> {
    /// Wraps `sequence` with the random `shift`.
    ///
    /// # Panics
    ///
    /// Panics if the shift length differs from the sequence dimension.
    pub fn new(sequence: L, shift: Vec<f64>) -> Self {
        assert_eq!(
            sequence.dimension(),
            shift.len(),
            "shift dimension must match the sequence"
        );
        let buffer = vec![0.0; shift.len()];
        Self {
            sequence,
            shift,
            buffer,
        }
    }

    /// Random shift vector.
    #[inline]
    pub fn shift(&self) -> &[f64] {
        &self.shift
    }
}

impl<L: LowDiscrepancySequence> LowDiscrepancySequence for ShiftedSequence<L> {
    #[inline]
    fn dimension(&self) -> usize {
        self.shift.len()
    }

    fn next_point(&mut self) -> &[f64] {
        let point = self.sequence.next_point();
        for ((slot, &x), &s) in self.buffer.iter_mut().zip(point).zip(&self.shift) {
            let y = x + s;
            *slot = if y >= 1.0 { y - 1.0 } else { y };
        }
        &self.buffer
    }

    fn reset(&mut self) {
        self.sequence.reset();
    }

    fn skip(&mut self, n: usize) {
        self.sequence.skip(n);
    }

    #[inline]
    fn position(&self) -> usize {
        self.sequence.position()
    }
}

/// Radical inverse of `n` in `base`: the base-`b` digits of `n` mirrored
/// about the radix point.
fn radical_inverse(mut n: u64, base: u64) -> f64 {
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;
    while n > 0 {
        result += (n % base) as f64 * factor;
        n /= base;
        factor *= inv_base;
    }
    result
}

fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}
