//! The adaptive density tree.
//!
//! A [`DensityTree`] carves the unit hypercube `[0, 1)^D` into a 2^D-ary
//! hierarchy of equal-split cells and learns a piecewise-constant density
//! from weighted observations:
//!
//! - [`DensityTree::splat`] deposits observations concurrently,
//! - [`DensityTree::build`] turns the accumulated sums into a normalized
//!   density estimate (pruning under-sampled cells),
//! - [`DensityTree::refine`] subdivides cells that concentrated probability
//!   mass and clears the accumulators for the next learning window,
//! - [`DensityTree::sample`] warps uniform random numbers into samples
//!   distributed proportionally to the learned density.
//!
//! Nodes live in a contiguous pool in pre-order: every child index is
//! strictly greater than its parent's, and index 0 is the root.

use rand::Rng;

use crate::atomic::AtomicValue;
use crate::point::{box_overlap, Point};
use crate::value::TreeValue;

use super::node::{TreeNode, INVALID_WEIGHT};
use super::params::TreeParams;

/// A sample drawn from the tree.
pub struct Sampled<'a, V> {
    /// Probability density of the returned point under the learned
    /// distribution. Integrates to one over the unit hypercube.
    pub pdf: f32,
    /// The sampled leaf's accumulated value.
    pub value: &'a AtomicValue<V>,
}

/// Adaptive 2^D-ary density tree over the unit hypercube.
///
/// `D` is the domain dimension and `A` the node arity; the two are redundant
/// (`A == 2^D`) but both are needed because array lengths cannot be computed
/// from another const parameter on stable Rust. Use the [`DensityTree1`],
/// [`DensityTree2`], [`DensityTree3`] aliases for the common dimensions.
///
/// A fresh tree is a single uniform leaf: `pdf` is 1 everywhere and sampling
/// is the identity warp. There is no empty state.
#[derive(Debug, Clone)]
pub struct DensityTree<V, const D: usize, const A: usize> {
    nodes: Vec<TreeNode<V, A>>,
    params: TreeParams,
}

/// Binary tree over the unit interval.
pub type DensityTree1<V> = DensityTree<V, 1, 2>;
/// Quadtree over the unit square.
pub type DensityTree2<V> = DensityTree<V, 2, 4>;
/// Octree over the unit cube.
pub type DensityTree3<V> = DensityTree<V, 3, 8>;

impl<V: TreeValue, const D: usize, const A: usize> DensityTree<V, D, A> {
    /// Create a uniform tree with default parameters.
    pub fn new() -> Self {
        Self::with_params(TreeParams::default())
    }

    /// Create a uniform tree with the given parameters.
    ///
    /// # Panics
    ///
    /// Panics if `A != 2^D` or `D == 0`.
    pub fn with_params(params: TreeParams) -> Self {
        assert!(D >= 1, "dimension must be at least 1");
        assert_eq!(A, 1usize << D, "arity must equal 2^dimension");

        let mut tree = Self {
            nodes: Vec::new(),
            params,
        };
        tree.set_uniform();
        tree
    }

    #[inline]
    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    #[inline]
    pub fn params_mut(&mut self) -> &mut TreeParams {
        &mut self.params
    }

    /// Number of nodes in the pool.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Height of the tree; a single-leaf tree has depth 1.
    pub fn depth(&self) -> usize {
        self.nodes[0].depth(&self.nodes)
    }

    /// Read-only view of the node pool, in pre-order.
    #[inline]
    pub fn nodes(&self) -> &[TreeNode<V, A>] {
        &self.nodes
    }

    pub(crate) fn replace_nodes(&mut self, nodes: Vec<TreeNode<V, A>>) {
        debug_assert!(!nodes.is_empty());
        self.nodes = nodes;
    }

    /// Return to the uniform single-leaf state, discarding all statistics.
    pub fn reset(&mut self) {
        self.set_uniform();
    }

    fn set_uniform(&mut self) {
        self.nodes.clear();
        self.nodes.push(TreeNode::uniform_leaf());
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Index and depth of the leaf whose cell contains `x`.
    ///
    /// The depth is the number of descents: 0 for a single-leaf tree.
    pub fn leaf_at(&self, x: &Point<D>) -> (usize, usize) {
        let mut local = *x;
        let mut index = 0usize;
        let mut depth = 0usize;

        while !self.nodes[index].is_leaf() {
            let mut slot = 0usize;
            for dim in 0..D {
                if local[dim] >= 0.5 {
                    slot |= 1 << dim;
                    local[dim] -= 0.5;
                }
                local[dim] *= 2.0;
            }

            let next = self.nodes[index].child(slot) as usize;
            debug_assert!(next > index, "child index must grow during descent");
            index = next;
            depth += 1;
        }

        (index, depth)
    }

    /// Probability density at `x` under the learned distribution.
    pub fn pdf(&self, x: &Point<D>) -> f32 {
        let (leaf, _) = self.leaf_at(x);
        self.nodes[leaf].density()
    }

    /// Accumulated value of the leaf containing `x`.
    pub fn value_at(&self, x: &Point<D>) -> &AtomicValue<V> {
        let (leaf, _) = self.leaf_at(x);
        self.nodes[leaf].value()
    }

    /// The root's accumulated value: the mean over the whole domain after a
    /// rebuild.
    pub fn estimate(&self) -> &AtomicValue<V> {
        self.nodes[0].value()
    }

    // -------------------------------------------------------------------------
    // Deposits
    // -------------------------------------------------------------------------

    /// Deposit one weighted observation at `x`.
    ///
    /// Callable concurrently from many threads; all leaf mutation goes
    /// through atomic accumulators. With filtering enabled (the default) the
    /// deposit is spread over a box footprint matching the containing leaf's
    /// size; the footprint is not clipped against the domain boundary, so
    /// deposits near the boundary lose a fraction of their mass unless leaf
    /// reweighting renormalizes it away.
    ///
    /// # Panics
    ///
    /// Panics if `weight` is negative or the value's target projection is
    /// negative.
    pub fn splat(&self, x: &Point<D>, value: &V, weight: f32) {
        assert!(weight >= 0.0, "sample weight must be non-negative");
        assert!(
            value.target() >= 0.0,
            "target projection must be non-negative"
        );

        if !self.params.filtering {
            let (leaf, _) = self.leaf_at(x);
            self.nodes[leaf].splat(value, weight, self.params.second_moment);
            return;
        }

        let (_, depth) = self.leaf_at(x);
        let size = 1.0 / (1u64 << depth) as f32;

        let mut origin_min = Point::origin();
        let mut origin_max = Point::origin();
        for dim in 0..D {
            origin_min[dim] = x[dim] - 0.5 * size;
            origin_max[dim] = x[dim] + 0.5 * size;
        }

        let footprint_volume = size.powi(D as i32);
        self.splat_filtered(
            0,
            &origin_min,
            &origin_max,
            &Point::origin(),
            1.0,
            value,
            weight / footprint_volume,
        );
    }

    /// Recursive box-filter deposit: weight is distributed over all leaves
    /// overlapping the footprint, proportionally to the overlap volume.
    #[allow(clippy::too_many_arguments)]
    fn splat_filtered(
        &self,
        index: usize,
        origin_min: &Point<D>,
        origin_max: &Point<D>,
        cell_min: &Point<D>,
        cell_size: f32,
        value: &V,
        weight: f32,
    ) {
        let mut cell_max = *cell_min;
        for dim in 0..D {
            cell_max[dim] += cell_size;
        }

        let overlap = box_overlap(origin_min, origin_max, cell_min, &cell_max);
        if overlap <= 0.0 {
            return;
        }

        let node = &self.nodes[index];
        if node.is_leaf() {
            node.splat(value, weight * overlap, self.params.second_moment);
            return;
        }

        let child_size = 0.5 * cell_size;
        for slot in 0..A {
            let mut child_min = *cell_min;
            for dim in 0..D {
                if slot & (1 << dim) != 0 {
                    child_min[dim] += child_size;
                }
            }
            self.splat_filtered(
                node.child(slot) as usize,
                origin_min,
                origin_max,
                &child_min,
                child_size,
                value,
                weight,
            );
        }
    }

    // -------------------------------------------------------------------------
    // Sampling
    // -------------------------------------------------------------------------

    /// Warp a vector of uniform random numbers into a sample distributed
    /// proportionally to the learned density.
    ///
    /// `x` is consumed as the randomness source and overwritten with the
    /// warped sample, which lies inside the sampled leaf's cell. The
    /// returned pdf matches [`DensityTree::pdf`] at the warped point.
    ///
    /// Must only be called on a tree whose densities are positive along
    /// every reachable path, which holds for any freshly constructed or
    /// successfully rebuilt tree.
    pub fn sample(&self, x: &mut Point<D>) -> Sampled<'_, V> {
        let mut base = Point::<D>::origin();
        let mut scale = 1.0f32;
        let mut index = 0usize;

        while !self.nodes[index].is_leaf() {
            let node = &self.nodes[index];
            let mut slot = 0usize;

            // Sample one dimension at a time, marginalizing the children's
            // densities over the dimensions not yet decided.
            for dim in 0..D {
                let mut p = [0.0f32; 2];
                for rest in 0..(1usize << (D - dim)) {
                    let child_slot = (rest << dim) | slot;
                    let child = node.child(child_slot) as usize;
                    p[rest & 1] += self.nodes[child].density();
                }

                let p0 = p[0] / (p[0] + p[1]);
                debug_assert!((0.0..=1.0).contains(&p0));

                if x[dim] > p0 {
                    slot |= 1 << dim;
                    base[dim] += 0.5 * scale;
                    x[dim] = (x[dim] - p0) / (1.0 - p0);
                } else {
                    x[dim] /= p0;
                }
            }

            let next = node.child(slot) as usize;
            debug_assert!(next > index, "child index must grow during descent");
            index = next;
            scale *= 0.5;
        }

        let leaf = &self.nodes[index];
        debug_assert!(leaf.density() > 0.0, "sampled a leaf with zero density");

        for dim in 0..D {
            x[dim] = base[dim] + scale * x[dim];
        }

        Sampled {
            pdf: leaf.density(),
            value: leaf.value(),
        }
    }

    /// Draw a sample using randomness from `rng`.
    pub fn sample_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> (Point<D>, Sampled<'_, V>) {
        let mut x = Point::uniform(rng);
        let sampled = self.sample(&mut x);
        (x, sampled)
    }

    // -------------------------------------------------------------------------
    // Rebuild
    // -------------------------------------------------------------------------

    /// Rebuild the tree from its accumulated statistics.
    ///
    /// Produces a fresh pool in which every leaf holds its mean value and
    /// every node's density is the fraction of the total probability mass in
    /// its cell, normalized so the root's density is 1. With leaf
    /// reweighting enabled, leaves that accumulated less than
    /// `min_leaf_weight` are pruned together with their siblings. A tree
    /// built without any samples falls back to the uniform state.
    pub fn build(&mut self) {
        let mut rebuilt = Vec::with_capacity(self.nodes.len());
        self.build_into(0, &mut rebuilt, 1.0);

        if rebuilt[0].weight() <= 0.0 || rebuilt[0].density() == 0.0 {
            self.set_uniform();
            return;
        }

        self.nodes = rebuilt;

        let norm = self.nodes[0].density();
        let total_weight = self.nodes[0].weight();
        for node in &self.nodes {
            node.set_density(node.density() / norm);
            if !self.params.leaf_reweighting {
                node.store_value(node.load_value().scaled(1.0 / total_weight));
            }
        }
    }

    /// First build pass: post-order append into `out`, turning accumulated
    /// sums into per-cell means and pruning invalid subtrees. Densities
    /// still need normalizing afterwards.
    fn build_into(&self, index: usize, out: &mut Vec<TreeNode<V, A>>, scale: f32) {
        let node = &self.nodes[index];
        let new_index = out.len();
        out.push(node.clone());

        if node.is_leaf() {
            let weight = node.weight();
            if self.params.leaf_reweighting && weight < self.params.min_leaf_weight {
                out[new_index].set_weight(INVALID_WEIGHT);
                return;
            }

            let w = if self.params.leaf_reweighting {
                1.0 / weight
            } else {
                scale
            };
            debug_assert!(w >= 0.0);

            let mut density = node.density() * w;
            if self.params.second_moment {
                density = density.sqrt();
            }

            let rebuilt = &mut out[new_index];
            rebuilt.mark_as_leaf();
            rebuilt.set_density(density);
            rebuilt.store_value(node.load_value().scaled(w));
            rebuilt.set_weight(weight);
            return;
        }

        let mut valid_count = 0usize;
        let mut density = 0.0f32;
        let mut weight = 0.0f32;
        let mut value = V::default();

        for slot in 0..A {
            let new_child = out.len() as u32;
            self.build_into(node.child(slot) as usize, out, scale * A as f32);
            out[new_index].set_child(slot, new_child);

            let child = &out[new_child as usize];
            if child.weight() >= 0.0 {
                density += child.density();
                weight += child.weight();
                value.accumulate_scaled(&child.load_value(), 1.0);
                valid_count += 1;
            }
        }

        if !self.params.leaf_reweighting {
            // Naive building accepts children unconditionally.
            valid_count = A;
        }

        if valid_count == 0 {
            out[new_index].set_weight(INVALID_WEIGHT);
            return;
        }

        let inv = 1.0 / valid_count as f32;
        out[new_index].set_density(density * inv);
        out[new_index].store_value(value.scaled(inv));
        out[new_index].set_weight(weight);

        if valid_count < A {
            // Some children were insufficiently sampled: discard the whole
            // subtree and keep the aggregate as a leaf.
            out.truncate(new_index + 1);
            out[new_index].mark_as_leaf();
        }
    }

    // -------------------------------------------------------------------------
    // Refinement
    // -------------------------------------------------------------------------

    /// Adapt the tree's resolution to the just-built density and clear all
    /// leaf accumulators for the next learning window.
    ///
    /// Leaves whose cell holds at least `split_threshold` of the probability
    /// mass are subdivided (recursively, carrying the parent's statistics
    /// into the children as a prior); the rest are reset.
    pub fn refine(&mut self) {
        self.refine_at(0, 1.0);
    }

    fn refine_at(&mut self, index: usize, scale: f32) {
        if self.nodes[index].is_leaf() {
            let criterion = self.nodes[index].density() / scale;
            if criterion >= self.params.split_threshold {
                self.split(index);
            } else {
                self.nodes[index].reset();
                return;
            }
        }

        for slot in 0..A {
            let child = self.nodes[index].child(slot) as usize;
            self.refine_at(child, scale * A as f32);
        }
    }

    /// Subdivide a leaf, appending its 2^D children to the pool. Each child
    /// starts as a copy of the parent, inheriting its accumulators.
    fn split(&mut self, parent: usize) {
        let first_child = self.nodes.len() as u32;
        debug_assert!(first_child as usize > parent);
        debug_assert!(self.nodes[parent].is_leaf());

        for _ in 0..A {
            let child = self.nodes[parent].clone();
            self.nodes.push(child);
        }
        for slot in 0..A {
            self.nodes[parent].set_child(slot, first_child + slot as u32);
        }
    }
}

impl<V: TreeValue, const D: usize, const A: usize> Default for DensityTree<V, D, A> {
    fn default() -> Self {
        Self::new()
    }
}
