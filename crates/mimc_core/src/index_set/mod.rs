//! Index-set strategies.
//!
//! An index-set strategy decides which indices belong to the search space of
//! a given size parameter `L`. The closed set of strategies is:
//!
//! | Label | Strategy | Rule for `L` |
//! |-------|----------|--------------|
//! | `SL` | Single-Level | `{0}` |
//! | `ML` | Multilevel | `{0, 1, ..., L}` |
//! | `TD` | Total-Degree | `Σ δ_k α_k ≤ L` |
//! | `FT` | Full-Tensor | `max δ_k α_k ≤ L` |
//! | `HC` | Hyperbolic-Cross | `Π (α_k + 1)^δ_k ≤ L + 1` |
//! | `AD` | Adaptive | grown index-by-index inside a bounding strategy |
//! | `U` | Unbiased | all indices of a bounded inner strategy |
//!
//! Every bounded rule is deterministic and monotone in `L`:
//! `enumerate(L) ⊆ enumerate(L + 1)`.
//!
//! # Examples
//!
//! ```
//! use mimc_core::index_set::IndexSet;
//! use mimc_core::types::Index;
//!
//! let td = IndexSet::td(2);
//! let indices = td.enumerate(1);
//! assert_eq!(indices.len(), 3);
//! assert!(indices.contains(&Index::from([1, 0])));
//! assert!(indices.contains(&Index::from([0, 1])));
//! ```

mod adaptive;
mod size;

pub use adaptive::{AdaptiveSet, TieBreak};
pub use size::IndexSetSize;

use crate::config::{ConfigError, OptionValue};
use crate::types::Index;
use std::collections::BTreeSet;

/// Slack used when comparing weighted norms against the size parameter.
const NORM_SLACK: f64 = 1e-10;

/// Keys recognised by the adaptive strategy.
pub const ADAPTIVE_KEYS: &[&str] = &["max_search_space", "penalization", "tie_break", "max_level"];

/// Positive per-direction weights of an anisotropic index-set rule.
#[derive(Clone, Debug, PartialEq)]
pub struct Weights(Vec<f64>);

impl Weights {
    /// Isotropic weights (all ones) of dimension `dim`.
    pub fn isotropic(dim: usize) -> Self {
        Self(vec![1.0; dim])
    }

    /// Validates and wraps explicit weights.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidIndexSet` if the weights are empty or any
    /// weight is not strictly positive and finite.
    pub fn new(weights: Vec<f64>) -> Result<Self, ConfigError> {
        if weights.is_empty() {
            return Err(ConfigError::InvalidIndexSet(
                "weights must have at least one direction".to_string(),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !(w.is_finite() && **w > 0.0)) {
            return Err(ConfigError::InvalidIndexSet(format!(
                "weights must be positive and finite, got {}",
                w
            )));
        }
        Ok(Self(weights))
    }

    /// Number of directions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Weights as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// Parameters of the adaptive strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct AdaptiveSpec {
    /// Number of directions.
    pub dim: usize,
    /// Bounding strategy limiting growth; enumerated at the maximum size
    /// parameter.
    pub max_search_space: Box<IndexSet>,
    /// Exponent `p` in the profit `|mean| / (V·C)^(p/2)`.
    pub penalization: f64,
    /// Policy for equal-profit candidates.
    pub tie_break: TieBreak,
    /// Optional cap on every coordinate.
    pub max_level: Option<usize>,
}

impl AdaptiveSpec {
    /// Default adaptive parameters: total-degree search space, penalisation
    /// 0.5, lowest-order tie-breaking, no coordinate cap.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            max_search_space: Box::new(IndexSet::td(dim)),
            penalization: 0.5,
            tie_break: TieBreak::default(),
            max_level: None,
        }
    }
}

/// Index-set strategy.
///
/// Selected at estimator construction and owned by the estimator; all call
/// sites dispatch through its methods.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexSet {
    /// Plain Monte Carlo at the root index only.
    SingleLevel,
    /// One-dimensional hierarchy of levels.
    Multilevel,
    /// Weighted total-degree multi-index set.
    TotalDegree(Weights),
    /// Weighted full-tensor multi-index set.
    FullTensor(Weights),
    /// Weighted hyperbolic-cross multi-index set.
    HyperbolicCross(Weights),
    /// Adaptively grown multi-index set.
    Adaptive(AdaptiveSpec),
    /// Randomised single-term unbiased estimator over a bounded inner set.
    Unbiased(Box<IndexSet>),
}

impl IndexSet {
    /// Single-level strategy.
    pub fn sl() -> Self {
        IndexSet::SingleLevel
    }

    /// Multilevel strategy.
    pub fn ml() -> Self {
        IndexSet::Multilevel
    }

    /// Isotropic total-degree strategy.
    pub fn td(dim: usize) -> Self {
        IndexSet::TotalDegree(Weights::isotropic(dim))
    }

    /// Weighted total-degree strategy.
    pub fn td_weighted(weights: Vec<f64>) -> Result<Self, ConfigError> {
        Ok(IndexSet::TotalDegree(Weights::new(weights)?))
    }

    /// Isotropic full-tensor strategy.
    pub fn ft(dim: usize) -> Self {
        IndexSet::FullTensor(Weights::isotropic(dim))
    }

    /// Weighted full-tensor strategy.
    pub fn ft_weighted(weights: Vec<f64>) -> Result<Self, ConfigError> {
        Ok(IndexSet::FullTensor(Weights::new(weights)?))
    }

    /// Isotropic hyperbolic-cross strategy.
    pub fn hc(dim: usize) -> Self {
        IndexSet::HyperbolicCross(Weights::isotropic(dim))
    }

    /// Weighted hyperbolic-cross strategy.
    pub fn hc_weighted(weights: Vec<f64>) -> Result<Self, ConfigError> {
        Ok(IndexSet::HyperbolicCross(Weights::new(weights)?))
    }

    /// Adaptive strategy with default parameters.
    pub fn ad(dim: usize) -> Self {
        IndexSet::Adaptive(AdaptiveSpec::new(dim))
    }

    /// Unbiased strategy over a bounded inner strategy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidIndexSet` if `inner` is itself adaptive
    /// or unbiased.
    pub fn unbiased(inner: IndexSet) -> Result<Self, ConfigError> {
        if !inner.is_bounded() {
            return Err(ConfigError::InvalidIndexSet(format!(
                "unbiased estimator needs a bounded inner index set, got {}",
                inner.label()
            )));
        }
        Ok(IndexSet::Unbiased(Box::new(inner)))
    }

    /// Short label of the strategy.
    pub fn label(&self) -> &'static str {
        match self {
            IndexSet::SingleLevel => "SL",
            IndexSet::Multilevel => "ML",
            IndexSet::TotalDegree(_) => "TD",
            IndexSet::FullTensor(_) => "FT",
            IndexSet::HyperbolicCross(_) => "HC",
            IndexSet::Adaptive(_) => "AD",
            IndexSet::Unbiased(_) => "U",
        }
    }

    /// Number of index directions.
    pub fn dim(&self) -> usize {
        match self {
            IndexSet::SingleLevel | IndexSet::Multilevel => 1,
            IndexSet::TotalDegree(w) | IndexSet::FullTensor(w) | IndexSet::HyperbolicCross(w) => {
                w.dim()
            }
            IndexSet::Adaptive(spec) => spec.dim,
            IndexSet::Unbiased(inner) => inner.dim(),
        }
    }

    /// `true` for strategies enumerated by a fixed rule.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, IndexSet::Adaptive(_) | IndexSet::Unbiased(_))
    }

    /// `true` for the adaptive strategy.
    #[inline]
    pub fn is_adaptive(&self) -> bool {
        matches!(self, IndexSet::Adaptive(_))
    }

    /// `true` for the unbiased strategy.
    #[inline]
    pub fn is_unbiased(&self) -> bool {
        matches!(self, IndexSet::Unbiased(_))
    }

    /// `true` if truncating the index set introduces a bias that must be
    /// estimated.
    pub fn has_bias(&self) -> bool {
        !matches!(self, IndexSet::SingleLevel | IndexSet::Unbiased(_))
    }

    /// Option keys recognised by this strategy.
    pub fn recognised_keys(&self) -> &'static [&'static str] {
        match self {
            IndexSet::Adaptive(_) => ADAPTIVE_KEYS,
            _ => &[],
        }
    }

    /// Applies a strategy-specific option.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownOption` if the key is not recognised and
    /// value errors for out-of-range values.
    pub fn apply_option(&mut self, key: &str, value: &OptionValue) -> Result<(), ConfigError> {
        let spec = match self {
            IndexSet::Adaptive(spec) => spec,
            _ => return Err(ConfigError::unknown_option(key, &[])),
        };
        match key {
            "max_search_space" => {
                let bound = match value.as_str(key)? {
                    "TD" => IndexSet::td(spec.dim),
                    "FT" => IndexSet::ft(spec.dim),
                    "HC" => IndexSet::hc(spec.dim),
                    other => {
                        return Err(ConfigError::invalid_value(
                            key,
                            format!("expected one of TD, FT, HC, got '{}'", other),
                        ))
                    }
                };
                spec.max_search_space = Box::new(bound);
            }
            "penalization" => {
                let p = value.as_f64(key)?;
                if !(0.0..=1.0).contains(&p) {
                    return Err(ConfigError::invalid_value(key, "must lie in [0, 1]"));
                }
                spec.penalization = p;
            }
            "tie_break" => {
                spec.tie_break = value.as_str(key)?.parse()?;
            }
            "max_level" => {
                spec.max_level = Some(value.as_usize(key)?);
            }
            _ => return Err(ConfigError::unknown_option(key, ADAPTIVE_KEYS)),
        }
        Ok(())
    }

    /// Enumerates the index set of size parameter `size`.
    ///
    /// For the adaptive strategy this is its admissible search space (the
    /// bounding strategy, clipped by `max_level`); for the unbiased strategy
    /// it is the inner strategy's set.
    pub fn enumerate(&self, size: usize) -> BTreeSet<Index> {
        let l = size as f64;
        match self {
            IndexSet::SingleLevel => std::iter::once(Index::zero(1)).collect(),
            IndexSet::Multilevel => (0..=size).map(|k| Index::from([k])).collect(),
            IndexSet::TotalDegree(w) => {
                downward_closed(w.dim(), |coords| weighted_sum(w, coords) <= l + NORM_SLACK)
            }
            IndexSet::FullTensor(w) => {
                downward_closed(w.dim(), |coords| weighted_max(w, coords) <= l + NORM_SLACK)
            }
            IndexSet::HyperbolicCross(w) => downward_closed(w.dim(), |coords| {
                weighted_product(w, coords) <= l + 1.0 + NORM_SLACK
            }),
            IndexSet::Adaptive(spec) => {
                let mut space = spec.max_search_space.enumerate(size);
                if let Some(max_level) = spec.max_level {
                    space.retain(|index| index.max_coord() <= max_level);
                }
                space
            }
            IndexSet::Unbiased(inner) => inner.enumerate(size),
        }
    }

    /// Outer layer of the set: `enumerate(size) \ enumerate(size - 1)`, or
    /// the root alone when `size == 0`.
    pub fn outer_boundary(&self, size: usize) -> BTreeSet<Index> {
        let current = self.enumerate(size);
        if size == 0 {
            return current;
        }
        let previous = self.enumerate(size - 1);
        current.difference(&previous).cloned().collect()
    }
}

fn weighted_sum(w: &Weights, coords: &[usize]) -> f64 {
    w.as_slice()
        .iter()
        .zip(coords)
        .map(|(d, &a)| d * a as f64)
        .sum()
}

fn weighted_max(w: &Weights, coords: &[usize]) -> f64 {
    w.as_slice()
        .iter()
        .zip(coords)
        .map(|(d, &a)| d * a as f64)
        .fold(0.0, f64::max)
}

fn weighted_product(w: &Weights, coords: &[usize]) -> f64 {
    w.as_slice()
        .iter()
        .zip(coords)
        .map(|(d, &a)| (a as f64 + 1.0).powf(*d))
        .product()
}

/// Collects the downward-closed set of `dim`-dimensional indices accepted
/// by `admits`.
///
/// `admits` must be monotone: if it accepts an index it accepts every index
/// below it. Coordinates are filled depth first with the trailing ones held
/// at zero, so a rejected prefix prunes its whole subtree and only accepted
/// indices are ever visited.
fn downward_closed(dim: usize, admits: impl Fn(&[usize]) -> bool) -> BTreeSet<Index> {
    let mut out = BTreeSet::new();
    let mut coords = vec![0usize; dim];
    if admits(&coords) {
        fill(0, &mut coords, &admits, &mut out);
    }
    out
}

fn fill(
    k: usize,
    coords: &mut [usize],
    admits: &impl Fn(&[usize]) -> bool,
    out: &mut BTreeSet<Index>,
) {
    if k == coords.len() {
        out.insert(Index::new(coords.to_vec()));
        return;
    }
    loop {
        fill(k + 1, coords, admits, out);
        coords[k] += 1;
        if !admits(coords) {
            break;
        }
    }
    coords[k] = 0;
}
