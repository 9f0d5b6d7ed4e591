//! Adaptive density tree data structures.

mod density;
mod node;
mod params;

pub use density::{DensityTree, DensityTree1, DensityTree2, DensityTree3, Sampled};
pub use node::TreeNode;
pub use params::TreeParams;
