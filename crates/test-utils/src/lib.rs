//! Shared test utilities for the radar workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic GRIB2 messages (`Grib2Builder`) and gzip helpers
//! - Reflectivity grid generators
//! - Fixture constants for bounds, dBZ sentinels and archive names
//! - Test data path helpers and skip macros for optional sample files
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod grib2;
pub mod paths;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use grib2::{gzip, Grib2Builder, Packing};
pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// Real MRMS samples are large and not checked in; tests that use them
/// return early when the file is absent.
///
/// ```ignore
/// let path = require_test_file!("MRMS_ReflectivityAtLowestAltitude_00.50_sample.grib2.gz");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Macro for approximate floating-point equality assertions.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
