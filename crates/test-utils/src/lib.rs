//! Fixtures shared by the CDI crates' tests.
//!
//! `fixtures` holds the three-strip administration layout (GeoJSON and
//! TopoJSON) with its matching initial values. `generators` builds synthetic
//! CDI rasters and encodes them as GeoTIFF, georeferenced onto the same strips.

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Assert two numbers differ by at most `tolerance`. Operands are cast to f64.
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected) = ($actual as f64, $expected as f64);
        let tolerance = $tolerance as f64;
        assert!(
            (actual - expected).abs() <= tolerance,
            "{} = {} is not within {} of {}",
            stringify!($actual),
            actual,
            tolerance,
            expected
        );
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_within_tolerance() {
        assert_approx_eq!(0.1001, 0.1, 0.001);
        assert_approx_eq!(-0.3, -0.300001, 0.0001);
    }

    #[test]
    #[should_panic(expected = "is not within")]
    fn test_outside_tolerance() {
        assert_approx_eq!(0.4, 0.3, 0.001);
    }
}
