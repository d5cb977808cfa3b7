//! State of the adaptively grown index set.
//!
//! The adaptive set keeps an `old_set` of fully expanded indices and an
//! `active_set` frontier. An index is admissible when every predecessor lies
//! in `old_set ∪ active_set`; only admissible indices inside the bounding
//! search space ever enter the active set.

use crate::config::ConfigError;
use crate::types::Index;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

/// Policy used when several active indices share the largest profit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TieBreak {
    /// Smallest index in lexicographic order wins.
    Lexicographic,
    /// Largest index in lexicographic order wins.
    ReverseLexicographic,
    /// Smallest coordinate sum wins, then lexicographic order.
    #[default]
    LowestOrder,
}

impl TieBreak {
    /// Returns `Ordering::Greater` when `a` should be preferred over `b`.
    fn prefer(&self, a: &Index, b: &Index) -> Ordering {
        match self {
            TieBreak::Lexicographic => b.cmp(a),
            TieBreak::ReverseLexicographic => a.cmp(b),
            TieBreak::LowestOrder => b.sum().cmp(&a.sum()).then_with(|| b.cmp(a)),
        }
    }
}

impl FromStr for TieBreak {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lexicographic" => Ok(TieBreak::Lexicographic),
            "reverse_lexicographic" => Ok(TieBreak::ReverseLexicographic),
            "lowest_order" => Ok(TieBreak::LowestOrder),
            other => Err(ConfigError::invalid_value(
                "tie_break",
                format!(
                    "expected lexicographic, reverse_lexicographic or lowest_order, got '{}'",
                    other
                ),
            )),
        }
    }
}

/// Adaptive index-set state.
///
/// # Examples
///
/// ```
/// use mimc_core::index_set::{AdaptiveSet, IndexSet, TieBreak};
/// use mimc_core::types::Index;
///
/// let space = IndexSet::td(2).enumerate(3);
/// let mut set = AdaptiveSet::new(2, space, TieBreak::LowestOrder);
/// assert_eq!(set.active_set().len(), 1);
///
/// let root = Index::zero(2);
/// let added = set.expand(&root);
/// assert_eq!(added, vec![Index::from([0, 1]), Index::from([1, 0])]);
/// assert!(set.old_set().contains(&root));
/// assert!(set.is_consistent());
/// ```
#[derive(Clone, Debug)]
pub struct AdaptiveSet {
    dim: usize,
    old_set: BTreeSet<Index>,
    active_set: BTreeSet<Index>,
    max_index_set: BTreeSet<Index>,
    boundary: BTreeSet<Index>,
    max_search_space: BTreeSet<Index>,
    tie_break: TieBreak,
}

impl AdaptiveSet {
    /// Creates a set whose active frontier is the root index.
    pub fn new(dim: usize, max_search_space: BTreeSet<Index>, tie_break: TieBreak) -> Self {
        let root = Index::zero(dim);
        let active_set: BTreeSet<Index> = std::iter::once(root).collect();
        Self {
            dim,
            old_set: BTreeSet::new(),
            max_index_set: active_set.clone(),
            boundary: active_set.clone(),
            active_set,
            max_search_space,
            tie_break,
        }
    }

    /// Number of directions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Fully expanded indices.
    #[inline]
    pub fn old_set(&self) -> &BTreeSet<Index> {
        &self.old_set
    }

    /// Frontier indices eligible for expansion.
    #[inline]
    pub fn active_set(&self) -> &BTreeSet<Index> {
        &self.active_set
    }

    /// Every index ever admitted.
    #[inline]
    pub fn max_index_set(&self) -> &BTreeSet<Index> {
        &self.max_index_set
    }

    /// Snapshot of the active set taken after the last expansion.
    #[inline]
    pub fn boundary(&self) -> &BTreeSet<Index> {
        &self.boundary
    }

    /// Bounding search space.
    #[inline]
    pub fn max_search_space(&self) -> &BTreeSet<Index> {
        &self.max_search_space
    }

    /// Tie-breaking policy.
    #[inline]
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// `old_set ∪ active_set`.
    pub fn current_set(&self) -> BTreeSet<Index> {
        self.old_set.union(&self.active_set).cloned().collect()
    }

    /// `true` when every predecessor of `index` is in `old_set ∪ active_set`.
    pub fn is_admissible(&self, index: &Index) -> bool {
        index
            .backward_neighbours()
            .all(|p| self.old_set.contains(&p) || self.active_set.contains(&p))
    }

    /// `true` when no active index remains to be expanded.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.active_set.is_empty()
    }

    /// Returns the active index with the largest profit, ties resolved by the
    /// configured policy. Non-finite profits are treated as zero.
    pub fn select(&self, profit: impl Fn(&Index) -> f64) -> Option<Index> {
        let mut best: Option<(&Index, f64)> = None;
        for index in &self.active_set {
            let p = profit(index);
            let p = if p.is_finite() { p } else { 0.0 };
            best = match best {
                None => Some((index, p)),
                Some((b, bp)) => {
                    let better = match p.partial_cmp(&bp).unwrap_or(Ordering::Equal) {
                        Ordering::Greater => true,
                        Ordering::Less => false,
                        Ordering::Equal => self.tie_break.prefer(index, b) == Ordering::Greater,
                    };
                    if better {
                        Some((index, p))
                    } else {
                        Some((b, bp))
                    }
                }
            };
        }
        best.map(|(index, _)| index.clone())
    }

    /// Moves `index` from the active set to the old set and admits its
    /// admissible forward neighbours from the search space.
    ///
    /// Returns the newly admitted indices in lexicographic order. Does nothing
    /// if `index` is not active.
    pub fn expand(&mut self, index: &Index) -> Vec<Index> {
        if !self.active_set.remove(index) {
            return Vec::new();
        }
        self.old_set.insert(index.clone());

        let mut added: Vec<Index> = index
            .forward_neighbours()
            .filter(|n| self.max_search_space.contains(n))
            .filter(|n| !self.old_set.contains(n) && !self.active_set.contains(n))
            .filter(|n| self.is_admissible(n))
            .collect();
        added.sort();
        for n in &added {
            self.active_set.insert(n.clone());
            self.max_index_set.insert(n.clone());
        }
        self.boundary = self.active_set.clone();
        added
    }

    /// Checks the admissibility invariant over the whole set: every index of
    /// `old_set ∪ active_set` has all predecessors in `old_set ∪ active_set`,
    /// and the two sets are disjoint.
    pub fn is_consistent(&self) -> bool {
        self.old_set.is_disjoint(&self.active_set)
            && self
                .old_set
                .iter()
                .chain(self.active_set.iter())
                .all(|index| self.is_admissible(index))
    }
}
