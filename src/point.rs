//! Points in the unit hypercube.

use std::ops::{Index, IndexMut};

use rand::Rng;

/// A point in the D-dimensional unit hypercube `[0, 1)^D`.
///
/// This is the coordinate type consumed by all tree operations. Sampling
/// routines also use it as scratch space: they consume a vector of uniform
/// random numbers and write the warped sample back into the same storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point<const D: usize>([f32; D]);

impl<const D: usize> Point<D> {
    /// The origin (all coordinates zero).
    #[inline]
    pub fn origin() -> Self {
        Self([0.0; D])
    }

    /// Draw a point with independent uniform coordinates in `[0, 1)`.
    pub fn uniform<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut coords = [0.0f32; D];
        for c in &mut coords {
            *c = rng.gen();
        }
        Self(coords)
    }

    /// Coordinates as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Returns true if every coordinate lies in `[0, 1)`.
    pub fn in_unit_cube(&self) -> bool {
        self.0.iter().all(|&c| (0.0..1.0).contains(&c))
    }
}

impl<const D: usize> Default for Point<D> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<const D: usize> From<[f32; D]> for Point<D> {
    fn from(coords: [f32; D]) -> Self {
        Self(coords)
    }
}

impl<const D: usize> Index<usize> for Point<D> {
    type Output = f32;

    #[inline]
    fn index(&self, dim: usize) -> &f32 {
        &self.0[dim]
    }
}

impl<const D: usize> IndexMut<usize> for Point<D> {
    #[inline]
    fn index_mut(&mut self, dim: usize) -> &mut f32 {
        &mut self.0[dim]
    }
}

/// Volume of the intersection of two axis-aligned boxes.
///
/// Boxes are given as (min, max) corner pairs. The result is zero when the
/// boxes are disjoint along any axis. Boxes are *not* clipped against the
/// unit hypercube: a filter footprint that extends past the domain boundary
/// loses the mass that falls outside.
pub fn box_overlap<const D: usize>(
    min1: &Point<D>,
    max1: &Point<D>,
    min2: &Point<D>,
    max2: &Point<D>,
) -> f32 {
    let mut overlap = 1.0f32;
    for dim in 0..D {
        overlap *= (max1[dim].min(max2[dim]) - min1[dim].max(min2[dim])).max(0.0);
    }
    overlap
}
