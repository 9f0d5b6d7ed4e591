//! Online-learning sampler with double-buffered training.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::tree::{DensityTree, TreeParams};
use crate::value::TreeValue;

use super::logger::{TrainingLogger, Verbosity};

/// Sample count at which the first rebuild happens; doubles after every
/// rebuild so the learning rate decays geometrically.
const INITIAL_MILESTONE: u64 = 1024;

/// Parameters for an [`OnlineSampler`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
    /// Mixing weight of the uniform fallback distribution. The returned pdf
    /// is always at least this value, so deposits keep nonzero probability
    /// everywhere even before anything was learned.
    pub uniform_prob: f32,
    /// Parameters for both inner trees.
    pub tree: TreeParams,
    /// Verbosity of rebuild logging.
    pub verbosity: Verbosity,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            uniform_prob: 0.5,
            tree: TreeParams::default(),
            verbosity: Verbosity::Silent,
        }
    }
}

/// The two tree buffers guarded by the sampler's lock.
#[derive(Debug)]
struct TreePair<V, const D: usize, const A: usize> {
    /// Read-side snapshot used by `sample` and `pdf`.
    sampling: DensityTree<V, D, A>,
    /// Accumulator receiving deposits; rebuilt and copied into `sampling`
    /// at every milestone.
    training: DensityTree<V, D, A>,
}

/// An importance sampler that learns its distribution online.
///
/// Deposits go into a *training* tree while samples are drawn from a stable
/// *sampling* snapshot, so renderer worker threads never observe a
/// half-trained distribution. At geometrically spaced sample-count
/// milestones the training tree is rebuilt, deep-copied into the sampling
/// slot and refined for the next learning window.
///
/// The tree's sampler is mixed with a uniform distribution
/// (`uniform_prob`), guaranteeing a nonzero pdf everywhere.
///
/// All of `sample`, `pdf` and `splat` take the internal lock in shared
/// mode and may run concurrently from many threads; rebuilds and `reset`
/// take it exclusively.
#[derive(Debug)]
pub struct OnlineSampler<V, const D: usize, const A: usize> {
    params: SamplerParams,
    trees: RwLock<TreePair<V, D, A>>,
    samples_so_far: AtomicU64,
    next_milestone: AtomicU64,
    logger: TrainingLogger,
}

impl<V: TreeValue, const D: usize, const A: usize> OnlineSampler<V, D, A> {
    /// Create a sampler with default parameters.
    pub fn new() -> Self {
        Self::with_params(SamplerParams::default())
    }

    /// Create a sampler with the given parameters.
    ///
    /// # Panics
    ///
    /// Panics if `uniform_prob` is not in `[0, 1]`.
    pub fn with_params(params: SamplerParams) -> Self {
        assert!(
            (0.0..=1.0).contains(&params.uniform_prob),
            "uniform_prob must be in [0, 1], got {}",
            params.uniform_prob
        );

        Self {
            params,
            trees: RwLock::new(TreePair {
                sampling: DensityTree::with_params(params.tree),
                training: DensityTree::with_params(params.tree),
            }),
            samples_so_far: AtomicU64::new(0),
            next_milestone: AtomicU64::new(INITIAL_MILESTONE),
            logger: TrainingLogger::new(params.verbosity),
        }
    }

    #[inline]
    pub fn params(&self) -> &SamplerParams {
        &self.params
    }

    /// Number of deposits seen since construction or the last reset.
    #[inline]
    pub fn samples_so_far(&self) -> u64 {
        self.samples_so_far.load(Ordering::Relaxed)
    }

    /// Sample count that will trigger the next rebuild.
    #[inline]
    pub fn next_milestone(&self) -> u64 {
        self.next_milestone.load(Ordering::Relaxed)
    }

    /// Read access to the sampling snapshot.
    pub fn sampling(&self) -> MappedRwLockReadGuard<'_, DensityTree<V, D, A>> {
        RwLockReadGuard::map(self.trees.read(), |pair| &pair.sampling)
    }

    /// Read access to the training accumulator.
    pub fn training(&self) -> MappedRwLockReadGuard<'_, DensityTree<V, D, A>> {
        RwLockReadGuard::map(self.trees.read(), |pair| &pair.training)
    }

    /// Warp uniform random numbers into a sample of the mixture
    /// distribution and return its pdf.
    ///
    /// The first coordinate doubles as the mixture selector: values below
    /// `uniform_prob` keep the point uniform, the rest are re-scaled and
    /// warped through the learned tree. Either way the returned pdf is
    /// `uniform_prob + (1 - uniform_prob) * p_tree(x)`.
    pub fn sample(&self, x: &mut Point<D>) -> f32 {
        let uniform_prob = self.params.uniform_prob;
        if uniform_prob >= 1.0 {
            return 1.0;
        }

        let trees = self.trees.read();
        let tree_pdf = if x[0] < uniform_prob {
            x[0] /= uniform_prob;
            trees.sampling.pdf(x)
        } else {
            x[0] = (x[0] - uniform_prob) / (1.0 - uniform_prob);
            trees.sampling.sample(x).pdf
        };

        uniform_prob + (1.0 - uniform_prob) * tree_pdf
    }

    /// Draw a sample using randomness from `rng`.
    pub fn sample_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> (Point<D>, f32) {
        let mut x = Point::uniform(rng);
        let pdf = self.sample(&mut x);
        (x, pdf)
    }

    /// Probability density of the mixture distribution at `x`.
    pub fn pdf(&self, x: &Point<D>) -> f32 {
        let uniform_prob = self.params.uniform_prob;
        if uniform_prob >= 1.0 {
            return 1.0;
        }

        let trees = self.trees.read();
        uniform_prob + (1.0 - uniform_prob) * trees.sampling.pdf(x)
    }

    /// Deposit one weighted observation at `x` into the training tree.
    ///
    /// Deposits become visible to `sample`/`pdf` no sooner than the next
    /// milestone rebuild. Crossing a milestone triggers the rebuild on the
    /// calling thread.
    pub fn splat(&self, x: &Point<D>, value: &V, weight: f32) {
        {
            let trees = self.trees.read();
            trees.training.splat(x, value, weight);
        }

        let seen = self.samples_so_far.fetch_add(1, Ordering::Relaxed) + 1;
        if seen >= self.next_milestone.load(Ordering::Relaxed) {
            self.step();
        }
    }

    /// Discard everything learned and return to the uniform state.
    pub fn reset(&self) {
        let mut trees = self.trees.write();
        trees.sampling = DensityTree::with_params(self.params.tree);
        trees.training = DensityTree::with_params(self.params.tree);
        self.samples_so_far.store(0, Ordering::Relaxed);
        self.next_milestone.store(INITIAL_MILESTONE, Ordering::Relaxed);
    }

    /// Milestone rebuild: build the training tree, publish it as the new
    /// sampling snapshot, refine the training tree for the next window.
    fn step(&self) {
        let mut trees = self.trees.write();

        let milestone = self.next_milestone.load(Ordering::Relaxed);
        if self.samples_so_far.load(Ordering::Relaxed) < milestone {
            // Another writer raced us here and already rebuilt.
            return;
        }

        trees.training.build();
        trees.sampling = trees.training.clone();
        trees.training.refine();

        self.next_milestone.store(milestone * 2, Ordering::Relaxed);

        self.logger
            .rebuild(milestone, trees.sampling.num_nodes(), trees.sampling.depth());
        self.logger
            .refined(trees.training.num_nodes(), trees.training.depth());
    }
}

impl<V: TreeValue, const D: usize, const A: usize> Default for OnlineSampler<V, D, A> {
    fn default() -> Self {
        Self::new()
    }
}
