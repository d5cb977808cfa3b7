//! Index-keyed storage.

use mimc_core::types::Index;
use std::collections::{BTreeMap, BTreeSet};

/// Largest dense box allocated up front; bigger bounds use sparse storage
/// only.
const MAX_DENSE_SLOTS: usize = 1 << 20;

/// Storage of per-index data.
///
/// Indices inside the bounding box of the set known at construction map to
/// a flat array position (row-major, so dense iteration is lexicographic).
/// Anything outside the box goes to a sparse ordered map.
#[derive(Clone, Debug)]
pub struct IndexArena<T> {
    bounds: Vec<usize>,
    strides: Vec<usize>,
    dense: Vec<Option<T>>,
    sparse: BTreeMap<Index, T>,
}

impl<T> IndexArena<T> {
    /// Arena pre-sized to the bounding box of `bound`.
    pub fn with_bound(bound: &BTreeSet<Index>) -> Self {
        let dim = bound.iter().next().map_or(0, Index::dim);
        let mut bounds = vec![0usize; dim];
        for index in bound {
            for (b, &c) in bounds.iter_mut().zip(index.coords()) {
                *b = (*b).max(c);
            }
        }

        let mut strides = vec![0usize; dim];
        let mut slots = if dim == 0 { 0 } else { 1usize };
        for k in (0..dim).rev() {
            strides[k] = slots;
            slots = match slots.checked_mul(bounds[k] + 1) {
                Some(n) if n <= MAX_DENSE_SLOTS => n,
                _ => return Self::sparse(),
            };
        }

        let mut dense = Vec::with_capacity(slots);
        dense.resize_with(slots, || None);
        Self {
            bounds,
            strides,
            dense,
            sparse: BTreeMap::new(),
        }
    }

    /// Arena without dense storage.
    pub fn sparse() -> Self {
        Self {
            bounds: Vec::new(),
            strides: Vec::new(),
            dense: Vec::new(),
            sparse: BTreeMap::new(),
        }
    }

    fn position(&self, index: &Index) -> Option<usize> {
        if self.dense.is_empty() || index.dim() != self.bounds.len() {
            return None;
        }
        let mut pos = 0;
        for ((&c, &b), &s) in index.coords().iter().zip(&self.bounds).zip(&self.strides) {
            if c > b {
                return None;
            }
            pos += c * s;
        }
        Some(pos)
    }

    /// Entry at `index`.
    pub fn get(&self, index: &Index) -> Option<&T> {
        match self.position(index) {
            Some(pos) => self.dense[pos].as_ref(),
            None => self.sparse.get(index),
        }
    }

    /// Mutable entry at `index`.
    pub fn get_mut(&mut self, index: &Index) -> Option<&mut T> {
        match self.position(index) {
            Some(pos) => self.dense[pos].as_mut(),
            None => self.sparse.get_mut(index),
        }
    }

    /// Entry at `index`, created with `init` if absent.
    pub fn get_or_insert_with(&mut self, index: &Index, init: impl FnOnce() -> T) -> &mut T {
        match self.position(index) {
            Some(pos) => self.dense[pos].get_or_insert_with(init),
            None => self.sparse.entry(index.clone()).or_insert_with(init),
        }
    }

    /// `true` if an entry exists at `index`.
    pub fn contains(&self, index: &Index) -> bool {
        self.get(index).is_some()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.dense.iter().filter(|slot| slot.is_some()).count() + self.sparse.len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in storage order: dense entries lexicographically, then
    /// sparse entries.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.dense
            .iter()
            .filter_map(Option::as_ref)
            .chain(self.sparse.values())
    }

    /// Drops every entry, keeping the dense layout.
    pub fn clear(&mut self) {
        self.dense.iter_mut().for_each(|slot| *slot = None);
        self.sparse.clear();
    }
}
