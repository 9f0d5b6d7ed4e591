//! Tree configuration.

use serde::{Deserialize, Serialize};

/// Parameters controlling splatting, rebuilds and refinement.
///
/// Use struct construction with `..Default::default()` for convenient
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Minimum per-cell probability mass at which a leaf is subdivided
    /// during refinement.
    pub split_threshold: f32,

    /// Normalize each leaf by its own accumulated weight during a rebuild,
    /// producing a per-leaf mean estimate. When disabled, leaves are
    /// normalized by cell area instead and never pruned.
    pub leaf_reweighting: bool,

    /// Spread each deposit over a box footprint matching the leaf size
    /// instead of depositing into a single leaf.
    pub filtering: bool,

    /// Accumulate the squared target and take the square root at rebuild
    /// time, estimating a second-moment density.
    pub second_moment: bool,

    /// Leaves whose accumulated weight stays below this threshold are
    /// considered insufficiently sampled and pruned during a rebuild.
    /// Only applies with `leaf_reweighting` enabled.
    pub min_leaf_weight: f32,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            split_threshold: 0.002,
            leaf_reweighting: true,
            filtering: true,
            second_moment: false,
            min_leaf_weight: 1e-3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let params = TreeParams::default();
        assert_eq!(params.split_threshold, 0.002);
        assert!(params.leaf_reweighting);
        assert!(params.filtering);
        assert!(!params.second_moment);
        assert_eq!(params.min_leaf_weight, 1e-3);
    }
}
