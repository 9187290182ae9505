//! GRIB2 parameter and level lookup tables.
//!
//! This module provides configurable lookup tables for translating
//! GRIB2 numeric codes into human-readable parameter names and level descriptions.
//!
//! Field names in a decoded grid come from these tables, so the set of names a
//! product exposes is configuration rather than code. `Grib2Tables::radar()`
//! carries the reflectivity products this service knows about.

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface", "mean sea level")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} mb", "{value} m above ground")
    Template(String),
}

impl LevelDescription {
    /// Format the level description, substituting placeholders if it's a template.
    ///
    /// Supported placeholders:
    /// - `{value}` - Raw level value (e.g., 100000 for 1000 mb in Pa)
    /// - `{value_mb}` - Value converted from Pa to mb (divided by 100)
    pub fn format(&self, value: u32) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => {
                let result = t.replace("{value}", &value.to_string());
                // Handle Pa to mb conversion for isobaric levels
                result.replace("{value_mb}", &(value / 100).to_string())
            }
        }
    }
}

/// GRIB2 parameter and level lookup tables.
///
/// Passed to the GRIB2 reader to translate numeric codes into field names.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter short name (e.g., "TMP", "UGRD")
    parameters: HashMap<ParamKey, String>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
}

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables for MRMS and NCEP radar reflectivity products.
    pub fn radar() -> Self {
        let mut tables = Self::new();

        // MRMS local discipline 209
        tables.add_parameter(209, 0, 16, "MergedReflectivityQC".to_string());
        tables.add_parameter(209, 1, 0, "PrecipRate".to_string());

        // NCEP forecast radar imagery
        tables.add_parameter(0, 16, 195, "DerivedRadarReflectivity".to_string());
        tables.add_parameter(0, 16, 196, "CompositeReflectivity".to_string());
        tables.add_parameter(0, 16, 198, "MaximumReflectivity".to_string());

        tables.add_level(1, LevelDescription::Static("surface".to_string()));
        tables.add_level(
            102,
            LevelDescription::Template("{value} m above MSL".to_string()),
        );
        tables.add_level(
            103,
            LevelDescription::Template("{value} m above ground".to_string()),
        );
        tables.add_level(
            200,
            LevelDescription::Static("entire atmosphere".to_string()),
        );

        tables
    }

    /// Add a parameter mapping
    ///
    /// # Arguments
    /// * `discipline` - GRIB2 discipline code
    /// * `category` - Parameter category within discipline
    /// * `number` - Parameter number within category
    /// * `name` - Short parameter name (e.g., "TMP", "UGRD")
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    ///
    /// # Arguments
    /// * `level_type` - GRIB2 level type code
    /// * `description` - Static or template description
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    ///
    /// Returns "Level type {type} value {value}" if not found.
    pub fn get_level_description(&self, level_type: u8, level_value: u32) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }
}
