//! Whole-file decoding into named fields and coordinate axes.
//!
//! Every field in a [`DecodedGrid`] is normalized to the same orientation:
//! row 0 is the southernmost row and column 0 the westernmost column,
//! whatever scanning mode the file used. Coordinate axes follow that order,
//! so latitude ascends and longitude ascends eastward within (-180, 180].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::sections::{GridDefinition, LatLonGrid, ScanningMode};
use crate::{Grib2Error, Grib2Message, Grib2Reader, Grib2Tables};

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Product metadata carried alongside a decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetadata {
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    pub level: String,
    pub reference_time: DateTime<Utc>,
}

/// A named 2-D field, row-major with row 0 at the south edge.
#[derive(Debug, Clone)]
pub struct GridField {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub metadata: Option<FieldMetadata>,
}

impl GridField {
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        values: Vec<f32>,
    ) -> Result<Self, Grib2Error> {
        if width == 0 || height == 0 || values.len() != width * height {
            return Err(Grib2Error::UnsupportedGrid(format!(
                "{} values cannot fill a {}x{} grid",
                values.len(),
                width,
                height
            )));
        }
        Ok(Self {
            name: name.into(),
            width,
            height,
            values,
            metadata: None,
        })
    }

    pub fn value(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.height && col < self.width {
            Some(self.values[row * self.width + col])
        } else {
            None
        }
    }
}

/// A 1-D coordinate variable.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateAxis {
    pub name: String,
    pub values: Vec<f64>,
}

impl CoordinateAxis {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Decoded contents of one file: fields in file order plus coordinates.
#[derive(Debug, Clone, Default)]
pub struct DecodedGrid {
    fields: Vec<GridField>,
    coordinates: Vec<CoordinateAxis>,
}

impl DecodedGrid {
    pub fn new(fields: Vec<GridField>, coordinates: Vec<CoordinateAxis>) -> Self {
        Self {
            fields,
            coordinates,
        }
    }

    pub fn fields(&self) -> &[GridField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&GridField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn coordinates(&self) -> &[CoordinateAxis] {
        &self.coordinates
    }

    pub fn coordinate(&self, name: &str) -> Option<&CoordinateAxis> {
        self.coordinates.iter().find(|c| c.name == name)
    }

    /// Take ownership of a field, leaving the rest of the grid intact.
    pub fn take_field(&mut self, name: &str) -> Option<GridField> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index))
    }
}

/// Decode an uncompressed GRIB2 payload.
///
/// A structurally broken message aborts decoding. A field that cannot be
/// unpacked, repeats an earlier name, or differs in shape from the first
/// field is skipped with a warning. It is an error when nothing usable
/// remains.
pub fn decode(payload: Bytes, tables: &Grib2Tables) -> Result<DecodedGrid, Grib2Error> {
    let mut reader = Grib2Reader::new(payload, tables.clone());
    let mut fields: Vec<GridField> = Vec::new();
    let mut coordinates: Vec<CoordinateAxis> = Vec::new();
    let mut last_error = None;

    while let Some(message) = reader.next_message()? {
        let name = message.parameter_name.clone();
        if fields.iter().any(|f| f.name == name) {
            debug!(field = %name, "Skipping repeated field");
            continue;
        }

        let grid = &message.grid_definition;
        let shape = (grid.ni as usize, grid.nj as usize);
        if let Some(first) = fields.first() {
            if (first.width, first.height) != shape {
                warn!(
                    field = %name,
                    width = shape.0,
                    height = shape.1,
                    "Skipping field with a different grid shape"
                );
                continue;
            }
        }

        match decode_field(&message) {
            Ok(field) => {
                if coordinates.is_empty() {
                    if let Some(lat_lon) = &grid.lat_lon {
                        coordinates = coordinate_axes(lat_lon, grid);
                    }
                }
                fields.push(field);
            }
            Err(e) => {
                warn!(field = %name, error = %e, "Skipping field that failed to decode");
                last_error = Some(e);
            }
        }
    }

    if fields.is_empty() {
        return Err(last_error.unwrap_or(Grib2Error::NoFields));
    }

    debug!(
        fields = fields.len(),
        coordinates = coordinates.len(),
        "Decoded GRIB2 payload"
    );
    Ok(DecodedGrid::new(fields, coordinates))
}

fn decode_field(message: &Grib2Message) -> Result<GridField, Grib2Error> {
    let grid = &message.grid_definition;
    let (width, height) = (grid.ni as usize, grid.nj as usize);
    if width == 0 || height == 0 || width * height != grid.num_data_points as usize {
        return Err(Grib2Error::UnsupportedGrid(format!(
            "{}x{} grid does not match {} data points",
            width, height, grid.num_data_points
        )));
    }

    let values = message.unpack_data()?;
    let values = orient(values, width, grid)?;

    let mut field = GridField::new(message.parameter_name.clone(), width, height, values)?;
    field.metadata = Some(FieldMetadata {
        discipline: message.discipline,
        category: message.product_definition.parameter_category,
        number: message.product_definition.parameter_number,
        level: message.level_description.clone(),
        reference_time: message.identification.reference_time,
    });
    Ok(field)
}

/// Reorder scan-order values so rows run south to north and columns west
/// to east.
fn orient(mut values: Vec<f32>, width: usize, grid: &GridDefinition) -> Result<Vec<f32>, Grib2Error> {
    let scan = grid.scanning_mode;
    if scan.j_consecutive() {
        return Err(Grib2Error::UnsupportedGrid(
            "Column-major scanning is not supported".to_string(),
        ));
    }

    for (j, row) in values.chunks_exact_mut(width).enumerate() {
        let reversed_row = scan.boustrophedon() && j % 2 == 1;
        if scan.i_negative() != reversed_row {
            row.reverse();
        }
    }

    if rows_start_north(grid, scan) {
        let flipped = values.chunks_exact(width).rev().flatten().copied().collect();
        return Ok(flipped);
    }
    Ok(values)
}

/// Row order follows the declared latitudes when the grid has them; the
/// scanning flag alone decides otherwise.
fn rows_start_north(grid: &GridDefinition, scan: ScanningMode) -> bool {
    match &grid.lat_lon {
        Some(ll) if ll.first_latitude != ll.last_latitude => ll.first_latitude > ll.last_latitude,
        _ => !scan.j_positive(),
    }
}

fn coordinate_axes(ll: &LatLonGrid, grid: &GridDefinition) -> Vec<CoordinateAxis> {
    let south = ll.first_latitude.min(ll.last_latitude);
    let north = ll.first_latitude.max(ll.last_latitude);

    let (west, mut east) = if grid.scanning_mode.i_negative() {
        (ll.last_longitude, ll.first_longitude)
    } else {
        (ll.first_longitude, ll.last_longitude)
    };
    if east < west {
        east += 360.0;
    }

    let latitudes = linspace(south, north, grid.nj as usize);
    let longitudes = linspace(west, east, grid.ni as usize)
        .into_iter()
        .map(normalize_longitude)
        .collect();

    vec![
        CoordinateAxis::new(LATITUDE, latitudes),
        CoordinateAxis::new(LONGITUDE, longitudes),
    ]
}

fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        n => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Map a longitude into (-180, 180].
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = lon.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
