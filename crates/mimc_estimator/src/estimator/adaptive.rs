//! Profit-driven growth of adaptive index sets.

use super::statistics::COST_FLOOR;
use super::Estimator;
use crate::sampler::Sampler;
use mimc_core::index_set::IndexSet;
use mimc_core::types::Index;
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest variance used in the profit denominator.
const VARIANCE_FLOOR: f64 = 1e-300;

/// Profit of expanding an index: `|mean| / (variance·cost)^(penalization/2)`.
///
/// A larger mean contribution makes an index more urgent to refine; high
/// variance or cost makes it less attractive.
///
/// # Examples
///
/// ```
/// use mimc_estimator::estimator::adaptive::profit;
///
/// // (0.25 · 4)^(1/2) = 1
/// assert!((profit(0.5, 0.25, 4.0, 1.0) - 0.5).abs() < 1e-12);
/// assert_eq!(profit(0.0, 0.0, 0.0, 0.5), 0.0);
/// ```
pub fn profit(mean: f64, variance: f64, cost: f64, penalization: f64) -> f64 {
    let denominator = (variance.max(VARIANCE_FLOOR) * cost.max(COST_FLOOR)).powf(penalization / 2.0);
    let p = mean.abs() / denominator;
    if p.is_finite() {
        p
    } else {
        0.0
    }
}

impl<S: Sampler> Estimator<S> {
    /// Expands the most profitable active index and adds the newly admitted
    /// indices to the current set.
    ///
    /// Returns the expanded index, or `None` for non-adaptive strategies or
    /// an exhausted active set.
    pub(crate) fn grow_adaptive(&mut self) -> Option<Index> {
        let penalization = match &self.index_set {
            IndexSet::Adaptive(spec) => spec.penalization,
            _ => return None,
        };
        let qoi = self.controlling_qoi();
        let profits: BTreeMap<Index, f64> = self
            .index_statistics(qoi)
            .into_iter()
            .map(|s| (s.index, profit(s.mean, s.variance, s.cost, penalization)))
            .collect();

        let adaptive = self.internals.adaptive.as_mut()?;
        let selected = adaptive.select(|index| profits.get(index).copied().unwrap_or(0.0))?;
        let added = adaptive.expand(&selected);
        debug!(
            index = %selected,
            profit = profits.get(&selected).copied().unwrap_or(0.0),
            admitted = added.len(),
            "expanded adaptive index"
        );
        self.internals.extend_current_set(added);
        Some(selected)
    }
}
