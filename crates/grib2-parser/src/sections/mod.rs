//! GRIB2 section parsing.
//!
//! Each parser takes the bytes of exactly one section (starting at its 4-byte
//! length field). Locating sections is done by [`SectionIter`], which walks a
//! message body section by section.

use crate::Grib2Error;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};

/// Section 0: Indicator Section (16 bytes)
#[derive(Debug, Clone)]
pub struct Indicator {
    pub discipline: u8,
    pub edition: u8,
    pub message_length: u64,
}

/// Section 1: Identification Section
#[derive(Debug, Clone)]
pub struct Identification {
    pub center: u16,
    pub sub_center: u16,
    pub table_version: u8,
    pub local_table_version: u8,
    pub significance_of_reference_time: u8,
    pub reference_time: DateTime<Utc>,
    pub production_status: u8,
    pub data_type: u8,
}

/// Scanning mode flags (Flag Table 3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanningMode(pub u8);

impl ScanningMode {
    /// Points along a row run east to west.
    pub fn i_negative(&self) -> bool {
        self.0 & 0x80 != 0
    }

    /// Rows run south to north.
    pub fn j_positive(&self) -> bool {
        self.0 & 0x40 != 0
    }

    /// Adjacent points are consecutive in j (column-major).
    pub fn j_consecutive(&self) -> bool {
        self.0 & 0x20 != 0
    }

    /// Every other row runs in the opposite direction.
    pub fn boustrophedon(&self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// Corner points of a regular latitude/longitude grid (template 3.0), in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLonGrid {
    pub first_latitude: f64,
    pub first_longitude: f64,
    pub last_latitude: f64,
    pub last_longitude: f64,
    pub i_increment: f64,
    pub j_increment: f64,
}

/// Section 3: Grid Definition Section
#[derive(Debug, Clone)]
pub struct GridDefinition {
    pub template: u16,
    pub num_data_points: u32,
    pub shape_of_earth: u8,
    /// Points along a parallel (columns).
    pub ni: u32,
    /// Points along a meridian (rows).
    pub nj: u32,
    /// Only present for template 3.0.
    pub lat_lon: Option<LatLonGrid>,
    pub scanning_mode: ScanningMode,
}

/// Section 4: Product Definition Section
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    pub template: u16,
    pub parameter_category: u8,
    pub parameter_number: u8,
    pub forecast_time: u32,
    pub level_type: u8,
    pub level_value: u32,
}

/// Section 5: Data Representation Section
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    /// Number of packed (present) values.
    pub num_packed_values: u32,
    pub template: u16,
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
    pub original_data_type: u8,
}

/// Section 6: Bitmap Section
#[derive(Debug, Clone)]
pub enum Bitmap {
    /// No bitmap, every grid point has a value (indicator 255).
    None,
    /// Bitmap bits, 1 = value present (indicator 0).
    Present(Bytes),
    /// Reuse the bitmap from an earlier field in the same message (indicator 254).
    PreviouslyDefined,
}

/// Section 7: Data Section
#[derive(Debug, Clone)]
pub struct DataSection {
    pub data: Bytes,
}

// ===== Section walking =====

/// Iterates `(section_number, section_bytes)` over a message body, starting
/// right after Section 0 and stopping at the `7777` end marker.
pub struct SectionIter<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> SectionIter<'a> {
    /// `message` must start with the `GRIB` indicator.
    pub fn new(message: &'a [u8]) -> Self {
        Self {
            data: message,
            offset: 16,
        }
    }
}

impl<'a> Iterator for SectionIter<'a> {
    type Item = Result<(u8, &'a [u8]), Grib2Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.data.get(self.offset..)?;
        if rest.len() < 4 || &rest[..4] == b"7777" {
            return None;
        }
        if rest.len() < 5 {
            self.offset = self.data.len();
            return Some(Err(Grib2Error::InvalidFormat(
                "Truncated section header".to_string(),
            )));
        }

        let section_length = read_u32(rest, 0) as usize;
        let number = rest[4];

        if section_length < 5 || section_length > rest.len() {
            self.offset = self.data.len();
            return Some(Err(Grib2Error::InvalidSection {
                section: number,
                reason: format!(
                    "Invalid section length {} ({} bytes remain)",
                    section_length,
                    rest.len()
                ),
            }));
        }

        self.offset += section_length;
        Some(Ok((number, &rest[..section_length])))
    }
}

// ===== Parsing Functions =====

/// Parse Section 0 (Indicator) from start of message
pub fn parse_indicator(data: &[u8]) -> Result<Indicator, Grib2Error> {
    if data.len() < 16 {
        return Err(Grib2Error::InvalidFormat(
            "Not enough data for indicator section".to_string(),
        ));
    }

    if &data[0..4] != b"GRIB" {
        return Err(Grib2Error::InvalidFormat(
            "Invalid GRIB magic bytes".to_string(),
        ));
    }

    // Octets 5-6 reserved, 7 discipline, 8 edition, 9-16 total length
    let discipline = data[6];
    let edition = data[7];

    if edition != 2 {
        return Err(Grib2Error::InvalidFormat(format!(
            "Expected GRIB edition 2, got {}",
            edition
        )));
    }

    let message_length = u64::from_be_bytes([
        data[8], data[9], data[10], data[11], data[12], data[13], data[14], data[15],
    ]);

    Ok(Indicator {
        discipline,
        edition,
        message_length,
    })
}

/// Parse Section 1 (Identification)
pub fn parse_identification(section: &[u8]) -> Result<Identification, Grib2Error> {
    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 1,
            reason: "Not enough data".to_string(),
        });
    }

    let center = read_u16(section, 5);
    let sub_center = read_u16(section, 7);
    let table_version = section[9];
    let local_table_version = section[10];
    let significance_of_reference_time = section[11];

    let year = read_u16(section, 12);
    let (month, day, hour, minute, second) =
        (section[14], section[15], section[16], section[17], section[18]);

    let reference_time = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_opt(hour as u32, minute as u32, second as u32))
        .ok_or_else(|| Grib2Error::InvalidSection {
            section: 1,
            reason: format!(
                "Invalid date: {}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ),
        })?;

    Ok(Identification {
        center,
        sub_center,
        table_version,
        local_table_version,
        significance_of_reference_time,
        reference_time: DateTime::<Utc>::from_naive_utc_and_offset(reference_time, Utc),
        production_status: section[19],
        data_type: section[20],
    })
}

/// Parse Section 3 (Grid Definition)
pub fn parse_grid_definition(section: &[u8]) -> Result<GridDefinition, Grib2Error> {
    if section.len() < 14 {
        return Err(Grib2Error::InvalidSection {
            section: 3,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 6-9: number of data points, 12-13: template number, 14+: template
    let num_data_points = read_u32(section, 6);
    let template = read_u16(section, 12);
    let gd = &section[14..];

    if template == 0 {
        // Template 3.0: regular latitude/longitude (Plate Carree)
        //
        // gd[0]      shape of the earth
        // gd[16..20] Ni, gd[20..24] Nj
        // gd[24..28] basic angle, gd[28..32] subdivisions
        // gd[32..36] La1, gd[36..40] Lo1, gd[40] resolution flags
        // gd[41..45] La2, gd[45..49] Lo2
        // gd[49..53] Di, gd[53..57] Dj, gd[57] scanning mode
        if gd.len() < 58 {
            return Err(Grib2Error::InvalidSection {
                section: 3,
                reason: format!("Template 3.0 needs at least 58 bytes, got {}", gd.len()),
            });
        }

        let ni = read_u32(gd, 16);
        let nj = read_u32(gd, 20);
        let unit = angle_unit(read_u32(gd, 24), read_u32(gd, 28));

        let lat_lon = LatLonGrid {
            first_latitude: read_signed32(gd, 32) as f64 * unit,
            first_longitude: read_signed32(gd, 36) as f64 * unit,
            last_latitude: read_signed32(gd, 41) as f64 * unit,
            last_longitude: read_signed32(gd, 45) as f64 * unit,
            i_increment: read_u32(gd, 49) as f64 * unit,
            j_increment: read_u32(gd, 53) as f64 * unit,
        };

        Ok(GridDefinition {
            template,
            num_data_points,
            shape_of_earth: gd[0],
            ni,
            nj,
            lat_lon: Some(lat_lon),
            scanning_mode: ScanningMode(gd[57]),
        })
    } else {
        // Most templates keep Nx/Ny at the same offsets as 3.0; coordinates
        // for projected grids are not derived here.
        if gd.len() < 24 {
            return Err(Grib2Error::InvalidSection {
                section: 3,
                reason: format!("Template 3.{} too short for grid dimensions", template),
            });
        }

        let scanning_mode = match template {
            // Lambert conformal
            30 => gd.get(50).copied().unwrap_or(0),
            _ => 0,
        };

        Ok(GridDefinition {
            template,
            num_data_points,
            shape_of_earth: gd[0],
            ni: read_u32(gd, 16),
            nj: read_u32(gd, 20),
            lat_lon: None,
            scanning_mode: ScanningMode(scanning_mode),
        })
    }
}

/// Parse Section 4 (Product Definition)
pub fn parse_product_definition(section: &[u8]) -> Result<ProductDefinition, Grib2Error> {
    if section.len() < 11 {
        return Err(Grib2Error::InvalidSection {
            section: 4,
            reason: "Not enough data".to_string(),
        });
    }

    // Bytes 5-6: number of coordinate values, 7-8: template number,
    // 9: parameter category, 10: parameter number.
    // For templates 4.0-4.15:
    // 18-21: forecast time, 22: first surface type, 23: scale factor,
    // 24-27: scaled value of first surface
    let template = read_u16(section, 7);
    let forecast_time = if section.len() >= 22 {
        read_u32(section, 18)
    } else {
        0
    };
    let level_type = section.get(22).copied().unwrap_or(255);
    let level_value = if section.len() >= 28 {
        read_u32(section, 24)
    } else {
        0
    };

    Ok(ProductDefinition {
        template,
        parameter_category: section[9],
        parameter_number: section[10],
        forecast_time,
        level_type,
        level_value,
    })
}

/// Parse Section 5 (Data Representation)
pub fn parse_data_representation(section: &[u8]) -> Result<DataRepresentation, Grib2Error> {
    if section.len() < 21 {
        return Err(Grib2Error::InvalidSection {
            section: 5,
            reason: "Not enough data".to_string(),
        });
    }

    // Octets 6-9 [5-8]: number of packed values
    // Octets 10-11 [9-10]: template number
    // Templates 5.0 and 5.41 share the following layout:
    // [11-14] reference value (IEEE f32), [15-16] binary scale factor,
    // [17-18] decimal scale factor, [19] bits per value, [20] original type
    Ok(DataRepresentation {
        num_packed_values: read_u32(section, 5),
        template: read_u16(section, 9),
        reference_value: f32::from_be_bytes([section[11], section[12], section[13], section[14]]),
        binary_scale_factor: read_signed16(section, 15),
        decimal_scale_factor: read_signed16(section, 17),
        bits_per_value: section[19],
        original_data_type: section[20],
    })
}

/// Parse Section 6 (Bitmap)
pub fn parse_bitmap(section: &[u8]) -> Result<Bitmap, Grib2Error> {
    if section.len() < 6 {
        return Err(Grib2Error::InvalidSection {
            section: 6,
            reason: "Not enough data".to_string(),
        });
    }

    match section[5] {
        255 => Ok(Bitmap::None),
        254 => Ok(Bitmap::PreviouslyDefined),
        0 => Ok(Bitmap::Present(Bytes::copy_from_slice(&section[6..]))),
        other => Err(Grib2Error::InvalidSection {
            section: 6,
            reason: format!("Predefined bitmap {} is not supported", other),
        }),
    }
}

/// Parse Section 7 (Data)
pub fn parse_data_section(section: &[u8]) -> Result<DataSection, Grib2Error> {
    if section.len() < 5 {
        return Err(Grib2Error::InvalidSection {
            section: 7,
            reason: "Not enough data".to_string(),
        });
    }

    Ok(DataSection {
        data: Bytes::copy_from_slice(&section[5..]),
    })
}

// ===== Helper Functions =====

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// GRIB2 signed integers are sign-magnitude, not two's complement.
fn read_signed32(data: &[u8], at: usize) -> i64 {
    let raw = read_u32(data, at);
    let magnitude = (raw & 0x7FFF_FFFF) as i64;
    if raw & 0x8000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

fn read_signed16(data: &[u8], at: usize) -> i16 {
    let raw = read_u16(data, at);
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Degrees per unit of the template's angle fields (microdegrees by default).
fn angle_unit(basic_angle: u32, subdivisions: u32) -> f64 {
    if basic_angle == 0 || subdivisions == 0 || subdivisions == u32::MAX {
        1e-6
    } else {
        basic_angle as f64 / subdivisions as f64
    }
}
