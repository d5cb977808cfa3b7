//! Multi-dimensional discretisation index.
//!
//! An [`Index`] identifies one resolution level of the underlying model. In
//! the multilevel setting it has a single coordinate (the level); in the
//! multi-index setting each coordinate refines one discretisation direction
//! independently.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Immutable tuple of non-negative integer coordinates.
///
/// Ordering is lexicographic over the coordinates, which gives a
/// deterministic iteration order for every `BTreeSet<Index>` used by the
/// index-set strategies.
///
/// # Examples
///
/// ```
/// use mimc_core::types::Index;
///
/// let index = Index::from([1, 2]);
/// assert_eq!(index.dim(), 2);
/// assert_eq!(index.sum(), 3);
/// assert_eq!(index.to_string(), "(1, 2)");
///
/// let predecessors: Vec<Index> = index.backward_neighbours().collect();
/// assert_eq!(predecessors, vec![Index::from([0, 2]), Index::from([1, 1])]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index(Vec<usize>);

impl Index {
    /// Creates an index from its coordinates.
    #[inline]
    pub fn new(coords: Vec<usize>) -> Self {
        Self(coords)
    }

    /// Returns the root index `(0, ..., 0)` of dimension `dim`.
    #[inline]
    pub fn zero(dim: usize) -> Self {
        Self(vec![0; dim])
    }

    /// Returns the unit index along direction `k`.
    ///
    /// # Panics
    ///
    /// Panics if `k >= dim`.
    pub fn unit(dim: usize, k: usize) -> Self {
        assert!(k < dim, "direction {} out of range for dimension {}", k, dim);
        let mut coords = vec![0; dim];
        coords[k] = 1;
        Self(coords)
    }

    /// Number of coordinates.
    #[inline]
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Coordinates as a slice.
    #[inline]
    pub fn coords(&self) -> &[usize] {
        &self.0
    }

    /// Sum of the coordinates (the "order" of the index).
    #[inline]
    pub fn sum(&self) -> usize {
        self.0.iter().sum()
    }

    /// Largest coordinate.
    #[inline]
    pub fn max_coord(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// Returns `true` for the root index.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&c| c == 0)
    }

    /// Returns `true` if every coordinate of `self` is at most the matching
    /// coordinate of `other`.
    pub fn is_dominated_by(&self, other: &Index) -> bool {
        self.dim() == other.dim() && self.0.iter().zip(&other.0).all(|(a, b)| a <= b)
    }

    /// Component-wise subtraction, `None` when any coordinate would go negative.
    pub fn checked_sub(&self, other: &Index) -> Option<Index> {
        if self.dim() != other.dim() {
            return None;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.checked_sub(*b))
            .collect::<Option<Vec<_>>>()
            .map(Index)
    }

    /// Predecessors: the index with one positive coordinate decremented, for
    /// every positive coordinate, in direction order.
    pub fn backward_neighbours(&self) -> impl Iterator<Item = Index> + '_ {
        (0..self.dim()).filter(|&k| self.0[k] > 0).map(move |k| {
            let mut coords = self.0.clone();
            coords[k] -= 1;
            Index(coords)
        })
    }

    /// Successors: the index with one coordinate incremented, for every
    /// direction.
    pub fn forward_neighbours(&self) -> impl Iterator<Item = Index> + '_ {
        (0..self.dim()).map(move |k| {
            let mut coords = self.0.clone();
            coords[k] += 1;
            Index(coords)
        })
    }
}

impl std::ops::Index<usize> for Index {
    type Output = usize;

    #[inline]
    fn index(&self, k: usize) -> &usize {
        &self.0[k]
    }
}

impl Add for &Index {
    type Output = Index;

    /// Component-wise addition.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions differ.
    fn add(self, rhs: &Index) -> Index {
        assert_eq!(self.dim(), rhs.dim(), "index dimensions differ");
        Index(self.0.iter().zip(&rhs.0).map(|(a, b)| a + b).collect())
    }
}

impl From<Vec<usize>> for Index {
    fn from(coords: Vec<usize>) -> Self {
        Self(coords)
    }
}

impl<const N: usize> From<[usize; N]> for Index {
    fn from(coords: [usize; N]) -> Self {
        Self(coords.to_vec())
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (k, c) in self.0.iter().enumerate() {
            if k > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}
