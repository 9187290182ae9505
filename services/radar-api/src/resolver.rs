//! Choice of the field to render and of the bounds to anchor it to.
//!
//! Field selection is a heuristic: the first field whose name contains the
//! configured hint (case-insensitive), otherwise the first field in decode
//! order. A dataset whose only field is unrelated is rendered anyway, so the
//! chosen name and whether the hint matched are reported with every frame.
//!
//! Bounds come from the first latitude alias and the first longitude alias
//! present in the grid. When either axis is missing or holds no finite value
//! the configured fallback box is used instead of failing the run.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use grib2_parser::{DecodedGrid, GridField};
use radar_common::GeoBounds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_variable_hint")]
    pub variable_hint: String,
    #[serde(default = "default_latitude_names")]
    pub latitude_names: Vec<String>,
    #[serde(default = "default_longitude_names")]
    pub longitude_names: Vec<String>,
    #[serde(default = "default_fallback_bounds")]
    pub fallback_bounds: GeoBounds,
    /// Values replaced with NaN before rendering. Empty by default, so
    /// sentinels below the colour scale render as its low end.
    #[serde(default)]
    pub missing_sentinels: Vec<f32>,
}

fn default_variable_hint() -> String {
    "reflect".to_string()
}

fn default_latitude_names() -> Vec<String> {
    ["latitude", "lat", "Latitude", "LATITUDE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_longitude_names() -> Vec<String> {
    ["longitude", "lon", "Longitude", "LONGITUDE"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_fallback_bounds() -> GeoBounds {
    GeoBounds::CONUS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            variable_hint: default_variable_hint(),
            latitude_names: default_latitude_names(),
            longitude_names: default_longitude_names(),
            fallback_bounds: default_fallback_bounds(),
            missing_sentinels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsSource {
    Coordinates,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelection {
    pub name: String,
    pub hint_matched: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub bounds: GeoBounds,
    pub source: BoundsSource,
    /// Longitudes are not monotonic, the grid likely crosses ±180°
    pub wraps_antimeridian: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Pick the field to render. `None` only for a grid with no fields.
    pub fn select_field(&self, grid: &DecodedGrid) -> Option<FieldSelection> {
        let hint = self.config.variable_hint.to_lowercase();

        if !hint.is_empty() {
            if let Some(name) = grid
                .field_names()
                .find(|name| name.to_lowercase().contains(&hint))
            {
                info!(field = %name, hint = %hint, "Selected field by name hint");
                return Some(FieldSelection {
                    name: name.to_string(),
                    hint_matched: true,
                });
            }
        }

        let name = grid.field_names().next()?;
        warn!(
            field = %name,
            hint = %hint,
            "No field matched the hint, using the first field"
        );
        Some(FieldSelection {
            name: name.to_string(),
            hint_matched: false,
        })
    }

    pub fn resolve_bounds(&self, grid: &DecodedGrid) -> Resolution {
        let latitude = first_alias(grid, &self.config.latitude_names);
        let longitude = first_alias(grid, &self.config.longitude_names);

        let computed = match (latitude, longitude) {
            (Some(lat), Some(lon)) => GeoBounds::from_coordinates(lat, lon).map(|b| (b, lon)),
            _ => None,
        };

        match computed {
            Some((bounds, longitudes)) => {
                let wraps_antimeridian = !is_monotonic(longitudes);
                if wraps_antimeridian {
                    warn!(
                        bounds = %bounds.to_csv(),
                        "Longitude axis is not monotonic, grid may cross the antimeridian"
                    );
                }
                Resolution {
                    bounds,
                    source: BoundsSource::Coordinates,
                    wraps_antimeridian,
                }
            }
            None => {
                warn!(
                    fallback = %self.config.fallback_bounds.to_csv(),
                    coordinates = ?grid.coordinates().iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
                    "No usable coordinates, using fallback bounds"
                );
                Resolution {
                    bounds: self.config.fallback_bounds,
                    source: BoundsSource::Fallback,
                    wraps_antimeridian: false,
                }
            }
        }
    }

    /// Replace configured sentinel values with NaN. Returns the count.
    pub fn mask_sentinels(&self, field: &mut GridField) -> usize {
        if self.config.missing_sentinels.is_empty() {
            return 0;
        }
        let mut masked = 0;
        for value in field.values.iter_mut() {
            if self.config.missing_sentinels.contains(value) {
                *value = f32::NAN;
                masked += 1;
            }
        }
        masked
    }
}

fn first_alias<'a>(grid: &'a DecodedGrid, aliases: &[String]) -> Option<&'a [f64]> {
    aliases
        .iter()
        .find_map(|alias| grid.coordinate(alias))
        .map(|axis| axis.values.as_slice())
}

fn is_monotonic(values: &[f64]) -> bool {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    finite.windows(2).all(|w| w[0] <= w[1]) || finite.windows(2).all(|w| w[0] >= w[1])
}
