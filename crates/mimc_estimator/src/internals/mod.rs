//! Mutable state owned by an estimator.
//!
//! - [`accumulator`]: per-index sample accumulators
//! - [`arena`]: index-keyed storage pre-sized to the largest index set

pub mod accumulator;
pub mod arena;

use crate::config::EstimatorOptions;
use crate::rng::{EstimatorRng, HaltonSequence, ShiftedSequence};
use crate::sample_method::SampleMethod;
use accumulator::{Accumulator, IndexAccumulators};
use arena::IndexArena;
use mimc_core::index_set::{AdaptiveSet, IndexSet, IndexSetSize};
use mimc_core::types::Index;
use std::collections::BTreeSet;

/// Randomly shifted Halton generators of one index, one per shift.
pub type ShiftGenerators = Vec<ShiftedSequence<HaltonSequence>>;

/// Side state of the unbiased estimator.
#[derive(Clone, Debug)]
pub struct UnbiasedState {
    /// Accumulator of `ΔQ_α / p_α` per quantity of interest.
    pub global: Vec<Accumulator>,
    /// Selection probability of each index of the inner set.
    pub probabilities: Vec<(Index, f64)>,
}

impl UnbiasedState {
    fn new(nb_of_qoi: usize, retain_samples: bool) -> Self {
        Self {
            global: vec![Accumulator::new(retain_samples); nb_of_qoi],
            probabilities: Vec::new(),
        }
    }

    /// Number of randomised single-term samples.
    pub fn nb_of_samples(&self) -> usize {
        self.global.first().map_or(0, Accumulator::count)
    }
}

/// Index sets, accumulators and generators of an estimator.
///
/// Accumulators and quasi-Monte Carlo generators live in arenas sized to
/// the index set at `max_index_set_param`; adaptive growth beyond that box
/// falls back to sparse storage.
#[derive(Clone, Debug)]
pub struct EstimatorInternals {
    pub(crate) current_set: BTreeSet<Index>,
    pub(crate) size: IndexSetSize,
    pub(crate) accumulators: IndexArena<IndexAccumulators>,
    pub(crate) generators: IndexArena<ShiftGenerators>,
    pub(crate) adaptive: Option<AdaptiveSet>,
    pub(crate) unbiased: Option<UnbiasedState>,
    pub(crate) rng: EstimatorRng,
    nb_of_qoi: usize,
    nb_of_shifts: usize,
    retain_samples: bool,
}

impl EstimatorInternals {
    /// Fresh state for the given strategies.
    pub fn new(index_set: &IndexSet, method: &SampleMethod, options: &EstimatorOptions) -> Self {
        let bound = index_set.enumerate(options.max_index_set_param);
        let adaptive = match index_set {
            IndexSet::Adaptive(spec) => {
                Some(AdaptiveSet::new(spec.dim, bound.clone(), spec.tie_break))
            }
            _ => None,
        };
        let unbiased = index_set
            .is_unbiased()
            .then(|| UnbiasedState::new(options.nb_of_qoi, options.save_samples));
        let generators = if method.is_qmc() {
            IndexArena::with_bound(&bound)
        } else {
            IndexArena::sparse()
        };
        let rng = match options.seed {
            Some(seed) => EstimatorRng::from_seed(seed),
            None => EstimatorRng::from_entropy(),
        };
        Self {
            current_set: BTreeSet::new(),
            size: IndexSetSize::new(),
            accumulators: IndexArena::with_bound(&bound),
            generators,
            adaptive,
            unbiased,
            rng,
            nb_of_qoi: options.nb_of_qoi,
            nb_of_shifts: method.nb_of_shifts(),
            retain_samples: options.save_samples,
        }
    }

    /// Index set currently sampled.
    #[inline]
    pub fn current_set(&self) -> &BTreeSet<Index> {
        &self.current_set
    }

    /// Size-parameter bookkeeping.
    #[inline]
    pub fn size(&self) -> &IndexSetSize {
        &self.size
    }

    /// Adaptive growth state, present for the adaptive strategy.
    #[inline]
    pub fn adaptive(&self) -> Option<&AdaptiveSet> {
        self.adaptive.as_ref()
    }

    /// Unbiased-estimator state, present for the unbiased strategy.
    #[inline]
    pub fn unbiased(&self) -> Option<&UnbiasedState> {
        self.unbiased.as_ref()
    }

    /// Accumulators at `index`, if it has been sampled.
    #[inline]
    pub fn accumulators(&self, index: &Index) -> Option<&IndexAccumulators> {
        self.accumulators.get(index)
    }

    /// Accumulators at `index`, created empty if absent.
    pub fn accumulators_mut(&mut self, index: &Index) -> &mut IndexAccumulators {
        let (nb_of_qoi, nb_of_shifts, retain) =
            (self.nb_of_qoi, self.nb_of_shifts, self.retain_samples);
        self.accumulators
            .get_or_insert_with(index, || IndexAccumulators::new(nb_of_qoi, nb_of_shifts, retain))
    }

    /// Samples per shift recorded at `index`.
    pub fn nb_of_samples(&self, index: &Index) -> usize {
        self.accumulators(index)
            .map_or(0, IndexAccumulators::nb_of_samples)
    }

    /// Adds indices to the current set.
    pub fn extend_current_set(&mut self, indices: impl IntoIterator<Item = Index>) {
        self.current_set.extend(indices);
    }

    /// Drops all samples and index-set progress; the generator state is
    /// kept so a reset estimator draws fresh inputs.
    pub fn reset(&mut self, index_set: &IndexSet, options: &EstimatorOptions) {
        self.current_set.clear();
        self.size.clear();
        self.accumulators.clear();
        self.generators.clear();
        if let (Some(adaptive), IndexSet::Adaptive(spec)) = (&mut self.adaptive, index_set) {
            *adaptive = AdaptiveSet::new(
                spec.dim,
                index_set.enumerate(options.max_index_set_param),
                spec.tie_break,
            );
        }
        if let Some(unbiased) = &mut self.unbiased {
            *unbiased = UnbiasedState::new(self.nb_of_qoi, self.retain_samples);
        }
    }
}
