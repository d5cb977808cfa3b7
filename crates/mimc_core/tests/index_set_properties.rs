//! Property tests for index-set strategies.
//!
//! # Test Categories
//!
//! 1. **Monotone growth**: `enumerate(L) ⊆ enumerate(L + 1)` for every bounded rule
//! 2. **Determinism**: identical input gives an identical set
//! 3. **Admissibility**: adaptive growth keeps every index admissible

use mimc_core::index_set::{AdaptiveSet, IndexSet, TieBreak};
use mimc_core::types::Index;
use proptest::prelude::*;

fn strategy(kind: usize, weights: Vec<f64>) -> IndexSet {
    match kind {
        0 => IndexSet::sl(),
        1 => IndexSet::ml(),
        2 => IndexSet::td_weighted(weights).unwrap(),
        3 => IndexSet::ft_weighted(weights).unwrap(),
        4 => IndexSet::hc_weighted(weights).unwrap(),
        _ => IndexSet::unbiased(IndexSet::td_weighted(weights).unwrap()).unwrap(),
    }
}

proptest! {
    #[test]
    fn prop_enumeration_is_monotone(
        kind in 0usize..6,
        weights in prop::collection::vec(0.25f64..2.0, 1..4),
        size in 0usize..6,
    ) {
        let set = strategy(kind, weights);
        let small = set.enumerate(size);
        let large = set.enumerate(size + 1);
        prop_assert!(small.is_subset(&large));
    }

    #[test]
    fn prop_enumeration_is_deterministic(
        kind in 0usize..6,
        weights in prop::collection::vec(0.25f64..2.0, 1..4),
        size in 0usize..5,
    ) {
        let set = strategy(kind, weights);
        prop_assert_eq!(set.enumerate(size), set.enumerate(size));
    }

    #[test]
    fn prop_enumeration_is_downward_closed(
        kind in 0usize..6,
        weights in prop::collection::vec(0.25f64..2.0, 1..4),
        size in 0usize..5,
    ) {
        let indices = strategy(kind, weights).enumerate(size);
        for index in &indices {
            for predecessor in index.backward_neighbours() {
                prop_assert!(indices.contains(&predecessor));
            }
        }
    }

    #[test]
    fn prop_adaptive_growth_keeps_admissibility(
        dim in 1usize..4,
        picks in prop::collection::vec(0usize..16, 1..25),
    ) {
        let space = IndexSet::td(dim).enumerate(4);
        let mut set = AdaptiveSet::new(dim, space, TieBreak::LowestOrder);
        for pick in picks {
            if set.is_exhausted() {
                break;
            }
            let active: Vec<Index> = set.active_set().iter().cloned().collect();
            let chosen = active[pick % active.len()].clone();
            set.expand(&chosen);
            prop_assert!(set.is_consistent());
            for index in set.active_set() {
                prop_assert!(set.is_admissible(index));
                prop_assert!(set.max_search_space().contains(index));
            }
        }
    }
}

#[test]
fn test_adaptive_growth_reaches_whole_search_space() {
    let space = IndexSet::td(2).enumerate(3);
    let mut set = AdaptiveSet::new(2, space.clone(), TieBreak::default());
    while let Some(next) = set.select(|index| 1.0 / (1.0 + index.sum() as f64)) {
        set.expand(&next);
    }
    assert!(set.is_exhausted());
    assert_eq!(set.old_set(), &space);
    assert_eq!(set.max_index_set(), &space);
}
