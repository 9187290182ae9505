//! Geographic bounds a rendered frame is anchored to.

use serde::{Deserialize, Serialize};

/// A geographic rectangle in degrees, ordered the way map overlays expect:
/// `(south, west, north, east)`.
///
/// Bounds built from real coordinates always satisfy `south <= north` and
/// `west <= east`. Grids crossing the antimeridian are not representable and
/// are flagged by the resolver instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Continental US box used when a dataset carries no usable coordinates.
    pub const CONUS: GeoBounds = GeoBounds {
        south: 25.0,
        west: -125.0,
        north: 50.0,
        east: -65.0,
    };

    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Compute bounds as the min/max over latitude and longitude samples.
    ///
    /// Non-finite samples are ignored. Returns `None` if either axis has no
    /// finite value.
    pub fn from_coordinates<'a, L, M>(latitudes: L, longitudes: M) -> Option<Self>
    where
        L: IntoIterator<Item = &'a f64>,
        M: IntoIterator<Item = &'a f64>,
    {
        let (south, north) = finite_range(latitudes)?;
        let (west, east) = finite_range(longitudes)?;
        Some(Self::new(south, west, north, east))
    }

    /// Parse "south,west,north,east".
    pub fn from_csv(s: &str) -> Result<Self, BoundsParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BoundsParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BoundsParseError::InvalidNumber(part.to_string()))?;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Format as "south,west,north,east" (inverse of [`GeoBounds::from_csv`]).
    pub fn to_csv(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }

    /// `[south, west, north, east]`, the order the HTTP response uses.
    pub fn as_array(&self) -> [f64; 4] {
        [self.south, self.west, self.north, self.east]
    }

    /// Extent in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Extent in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// True when south <= north and west <= east.
    pub fn is_ordered(&self) -> bool {
        self.south <= self.north && self.west <= self.east
    }

    pub fn contains_point(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

fn finite_range<'a, I>(values: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a f64>,
{
    values
        .into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[derive(Debug, thiserror::Error)]
pub enum BoundsParseError {
    #[error("Invalid bounds format: {0}. Expected 'south,west,north,east'")]
    InvalidFormat(String),

    #[error("Invalid number in bounds: {0}")]
    InvalidNumber(String),
}
