//! Testing utilities for guidetree.
//!
//! This module provides assertion helpers and small statistics used in both
//! unit tests and integration tests.

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for floating point comparisons on O(1) densities.
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

/// Minimum expected count for a histogram bin to enter a chi-squared
/// statistic. Bins below this are skipped, the standard validity rule.
pub const MIN_EXPECTED_COUNT: f64 = 5.0;

// =============================================================================
// Floating Point Assertions
// =============================================================================

/// Assert that two densities (or any other floats) agree within an
/// absolute tolerance.
///
/// # Examples
///
/// ```
/// # use guidetree::assert_approx_eq;
/// assert_approx_eq!(1.0f32, 1.0001f32, 0.001);
/// ```
///
/// # Panics
///
/// Panics if the absolute difference exceeds the tolerance.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let (lhs, rhs) = ($left, $right);
        let tol = $tolerance;
        let err = (lhs - rhs).abs();
        assert!(
            err <= tol,
            "densities differ by {err:?} (tolerance {tol:?}): {lhs:?} vs {rhs:?}"
        );
    }};
}

// =============================================================================
// Goodness of Fit
// =============================================================================

/// Chi-squared statistic for observed counts against expected counts.
///
/// Bins with an expected count below [`MIN_EXPECTED_COUNT`] are skipped.
/// Returns the statistic and the number of bins that entered it; compare
/// against a critical value for `bins - 1` degrees of freedom.
pub fn chi_squared(observed: &[u64], expected: &[f64]) -> (f64, usize) {
    assert_eq!(
        observed.len(),
        expected.len(),
        "observed and expected bin counts must match"
    );

    let mut statistic = 0.0;
    let mut bins = 0;
    for (&obs, &exp) in observed.iter().zip(expected) {
        if exp < MIN_EXPECTED_COUNT {
            continue;
        }
        let diff = obs as f64 - exp;
        statistic += diff * diff / exp;
        bins += 1;
    }
    (statistic, bins)
}
