//! guidetree: adaptive spatial density trees for importance sampling.
//!
//! An online-learning distribution over the unit hypercube `[0, 1)^D`.
//! Weighted observations are deposited into an adaptive 2^D-ary tree, which
//! learns a piecewise-constant approximation of the induced density and can
//! then draw new samples proportionally to it.
//!
//! # Key Types
//!
//! - [`DensityTree`] - the adaptive tree: splat / build / refine / sample
//! - [`OnlineSampler`] - double-buffered wrapper that learns while sampling
//! - [`TreeParams`] / [`SamplerParams`] - configuration
//! - [`TreeValue`] / [`ScalarValue`] - leaf value types
//! - [`TreeCodec`] - binary serialization with optional integrity framing
//!
//! # Learning Loop
//!
//! A [`DensityTree`] alternates accumulation windows with rebuilds:
//! `splat` deposits run concurrently from any number of threads, `build`
//! turns the sums into a normalized density estimate, and `refine` adapts
//! the spatial resolution before the next window. [`OnlineSampler`] drives
//! this cycle automatically on a doubling sample-count schedule while
//! keeping a stable snapshot for samplers, mixed with a uniform fallback so
//! the pdf never vanishes.

// Re-export approx traits for users who want to compare densities.
pub use approx;

pub mod atomic;
pub mod io;
pub mod point;
pub mod testing;
pub mod training;
pub mod tree;
pub mod value;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use atomic::{AtomicF32, AtomicValue};
pub use io::{ReadError, TreeCodec, WriteError};
pub use point::{box_overlap, Point};
pub use training::{OnlineSampler, SamplerParams, TrainingLogger, Verbosity};
pub use tree::{
    DensityTree, DensityTree1, DensityTree2, DensityTree3, Sampled, TreeNode, TreeParams,
};
pub use value::{ScalarValue, TreeValue};
