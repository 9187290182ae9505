//! Common fixtures for radar tests.

/// Bounds as (south, west, north, east).
pub mod bounds {
    /// Fallback extent used when a file has no usable coordinates
    pub const CONUS_FALLBACK: (f64, f64, f64, f64) = (25.0, -125.0, 50.0, -65.0);

    /// Small synthetic grid used by the pipeline tests
    pub const SMALL_STORM: (f64, f64, f64, f64) = (30.0, -100.0, 40.0, -90.0);
}

/// Reflectivity values (dBZ)
pub mod dbz {
    /// Bottom of the colour scale
    pub const MIN: f32 = -32.0;
    /// Top of the colour scale
    pub const MAX: f32 = 75.0;
    /// MRMS "no coverage" sentinel
    pub const NO_COVERAGE: f32 = -999.0;
    /// MRMS "missing" sentinel
    pub const MISSING: f32 = -99.0;
}

/// Archive names
pub mod archive {
    pub const BASE_URL: &str = "https://noaa-mrms-pds.s3.amazonaws.com";
    pub const PRODUCT: &str = "MRMS_ReflectivityAtLowestAltitude";
    pub const VARIANT: &str = "00.50";
}
