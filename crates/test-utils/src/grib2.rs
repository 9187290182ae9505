//! Synthetic GRIB2 messages for parser and pipeline tests.
//!
//! The generated messages have valid structure: sections 0, 1, 3 (template
//! 3.0), 4 (template 4.0), 5 (template 5.0 or 5.41), 6, 7 and the end
//! marker. Values are packed with 16 bits. NaN values are written as
//! missing points through a section 6 bitmap.

use std::io::{Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Scanning mode flags (Flag table 3.4)
pub mod scan {
    /// Points scan in the -i direction (east to west)
    pub const I_NEGATIVE: u8 = 0x80;
    /// Points scan in the +j direction (south to north)
    pub const J_POSITIVE: u8 = 0x40;
    /// Adjacent points in j are consecutive (column-major)
    pub const J_CONSECUTIVE: u8 = 0x20;
    /// Alternate rows reverse direction
    pub const BOUSTROPHEDON: u8 = 0x10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packing {
    Simple,
    Png,
}

/// Build a GRIB2 message with the specified parameters
#[derive(Debug, Clone)]
pub struct Grib2Builder {
    discipline: u8,
    center: u16,
    reference_time: (u16, u8, u8, u8, u8),
    // Grid definition
    ni: u32,
    nj: u32,
    south: f64,
    west: f64,
    north: f64,
    east: f64,
    scanning_mode: u8,
    // Product definition
    param_category: u8,
    param_number: u8,
    level_type: u8,
    level_value: u32,
    // Data, in file scan order
    decimal_scale: i16,
    packing: Packing,
    data_values: Vec<f32>,
}

impl Grib2Builder {
    /// MRMS-like reflectivity: discipline 209, category 0, number 16,
    /// 500 m above MSL, first row north.
    pub fn new_mrms() -> Self {
        let ni = 20;
        let nj = 15;
        Self {
            discipline: 209,
            center: 161,
            reference_time: (2025, 3, 9, 14, 32),
            ni,
            nj,
            south: 40.005,
            west: -129.995,
            north: 54.995,
            east: -110.005,
            scanning_mode: 0,
            param_category: 0,
            param_number: 16,
            level_type: 102,
            level_value: 500,
            decimal_scale: 0,
            packing: Packing::Simple,
            data_values: vec![-999.0; (ni * nj) as usize],
        }
    }

    pub fn with_reference_time(mut self, year: u16, month: u8, day: u8, hour: u8, minute: u8) -> Self {
        self.reference_time = (year, month, day, hour, minute);
        self
    }

    /// Resize the grid; data is reset to zeros.
    pub fn with_grid(mut self, ni: u32, nj: u32) -> Self {
        self.ni = ni;
        self.nj = nj;
        self.data_values = vec![0.0; (ni * nj) as usize];
        self
    }

    /// Geographic extent in degrees. Longitudes may be given in either
    /// -180..180 or 0..360; they are written in 0..360 like MRMS.
    pub fn with_bounds(mut self, south: f64, west: f64, north: f64, east: f64) -> Self {
        self.south = south;
        self.west = west;
        self.north = north;
        self.east = east;
        self
    }

    pub fn with_scanning_mode(mut self, mode: u8) -> Self {
        self.scanning_mode = mode;
        self
    }

    pub fn with_discipline(mut self, discipline: u8) -> Self {
        self.discipline = discipline;
        self
    }

    pub fn with_parameter(mut self, category: u8, number: u8) -> Self {
        self.param_category = category;
        self.param_number = number;
        self
    }

    pub fn with_level(mut self, level_type: u8, level_value: u32) -> Self {
        self.level_type = level_type;
        self.level_value = level_value;
        self
    }

    pub fn with_decimal_scale(mut self, decimal_scale: i16) -> Self {
        self.decimal_scale = decimal_scale;
        self
    }

    pub fn with_packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    pub fn with_constant_value(mut self, value: f32) -> Self {
        self.data_values = vec![value; (self.ni * self.nj) as usize];
        self
    }

    /// Values in file scan order.
    pub fn with_data(mut self, data: Vec<f32>) -> Self {
        self.data_values = data;
        self
    }

    /// Build the complete GRIB2 message bytes
    pub fn build(&self) -> Vec<u8> {
        let sections = [
            self.build_section1(),
            self.build_section3(),
            self.build_section4(),
            self.build_section5(),
            self.build_section6(),
            self.build_section7(),
        ];

        let message_length = 16 + sections.iter().map(Vec::len).sum::<usize>() + 4;

        let mut message = Vec::with_capacity(message_length);
        message.extend_from_slice(b"GRIB");
        message.extend_from_slice(&[0, 0]); // Reserved
        message.push(self.discipline);
        message.push(2); // Edition 2
        message.extend_from_slice(&(message_length as u64).to_be_bytes());
        for section in &sections {
            message.extend_from_slice(section);
        }
        message.extend_from_slice(b"7777");
        message
    }

    /// The message gzip-compressed, as published in the archive.
    pub fn build_gzip(&self) -> Vec<u8> {
        gzip(&self.build())
    }

    fn build_section1(&self) -> Vec<u8> {
        let (year, month, day, hour, minute) = self.reference_time;
        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(1);
        section.extend_from_slice(&self.center.to_be_bytes());
        section.extend_from_slice(&0u16.to_be_bytes()); // Sub-center
        section.push(2); // Master table version
        section.push(1); // Local table version
        section.push(0); // Significance of reference time (analysis)
        section.extend_from_slice(&year.to_be_bytes());
        section.extend_from_slice(&[month, day, hour, minute, 0]);
        section.push(0); // Production status (operational)
        section.push(0); // Type of data (analysis)
        section
    }

    fn build_section3(&self) -> Vec<u8> {
        let j_positive = self.scanning_mode & scan::J_POSITIVE != 0;
        let i_negative = self.scanning_mode & scan::I_NEGATIVE != 0;
        let (la1, la2) = if j_positive {
            (self.south, self.north)
        } else {
            (self.north, self.south)
        };
        let (lo1, lo2) = if i_negative {
            (self.east, self.west)
        } else {
            (self.west, self.east)
        };
        let di = step(self.west, self.east, self.ni);
        let dj = step(self.south, self.north, self.nj);

        let mut section = Vec::new();
        section.extend_from_slice(&72u32.to_be_bytes());
        section.push(3);
        section.push(0); // Source of grid definition
        section.extend_from_slice(&(self.ni * self.nj).to_be_bytes());
        section.push(0); // Number of octets for optional list
        section.push(0); // Interpretation of optional list
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 3.0

        section.push(6); // Shape of Earth (spherical, 6371229 m)
        section.extend_from_slice(&[0; 15]); // Radius and axes, unused for shape 6
        section.extend_from_slice(&self.ni.to_be_bytes());
        section.extend_from_slice(&self.nj.to_be_bytes());
        section.extend_from_slice(&0u32.to_be_bytes()); // Basic angle
        section.extend_from_slice(&u32::MAX.to_be_bytes()); // Subdivisions
        section.extend_from_slice(&signed32(micro(la1)));
        section.extend_from_slice(&signed32(micro(to_east_positive(lo1))));
        section.push(48); // Resolution and component flags
        section.extend_from_slice(&signed32(micro(la2)));
        section.extend_from_slice(&signed32(micro(to_east_positive(lo2))));
        section.extend_from_slice(&(micro(di) as u32).to_be_bytes());
        section.extend_from_slice(&(micro(dj) as u32).to_be_bytes());
        section.push(self.scanning_mode);
        section
    }

    fn build_section4(&self) -> Vec<u8> {
        let mut section = Vec::new();
        section.extend_from_slice(&34u32.to_be_bytes());
        section.push(4);
        section.extend_from_slice(&0u16.to_be_bytes()); // Number of coordinate values
        section.extend_from_slice(&0u16.to_be_bytes()); // Template 4.0
        section.push(self.param_category);
        section.push(self.param_number);
        section.push(0); // Type of generating process (analysis)
        section.push(0); // Background generating process
        section.push(0); // Analysis or forecast process
        section.extend_from_slice(&0u16.to_be_bytes()); // Hours of cutoff
        section.push(0); // Minutes of cutoff
        section.push(0); // Time range unit (minutes)
        section.extend_from_slice(&0u32.to_be_bytes()); // Forecast time
        section.push(self.level_type);
        section.push(0); // Scale factor
        section.extend_from_slice(&self.level_value.to_be_bytes());
        section.push(255); // No second fixed surface
        section.push(0);
        section.extend_from_slice(&0u32.to_be_bytes());
        section
    }

    fn build_section5(&self) -> Vec<u8> {
        let packing = self.packing_params();
        let template: u16 = match self.packing {
            Packing::Simple => 0,
            Packing::Png => 41,
        };

        let mut section = Vec::new();
        section.extend_from_slice(&21u32.to_be_bytes());
        section.push(5);
        section.extend_from_slice(&(self.present_values().count() as u32).to_be_bytes());
        section.extend_from_slice(&template.to_be_bytes());
        section.extend_from_slice(&packing.reference.to_be_bytes());
        section.extend_from_slice(&signed16(packing.binary_scale));
        section.extend_from_slice(&signed16(self.decimal_scale));
        section.push(packing.bits);
        section.push(0); // Original field type (floating point)
        section
    }

    fn build_section6(&self) -> Vec<u8> {
        let mut section = Vec::new();
        if self.data_values.iter().any(|v| v.is_nan()) {
            let mut bits = vec![0u8; self.data_values.len().div_ceil(8)];
            for (i, v) in self.data_values.iter().enumerate() {
                if !v.is_nan() {
                    bits[i / 8] |= 0x80 >> (i % 8);
                }
            }
            section.extend_from_slice(&(6 + bits.len() as u32).to_be_bytes());
            section.push(6);
            section.push(0); // Bitmap follows
            section.extend_from_slice(&bits);
        } else {
            section.extend_from_slice(&6u32.to_be_bytes());
            section.push(6);
            section.push(255); // No bitmap
        }
        section
    }

    fn build_section7(&self) -> Vec<u8> {
        let packed = match self.packing {
            Packing::Simple => self.pack_simple(),
            Packing::Png => self.pack_png(),
        };
        let mut section = Vec::new();
        section.extend_from_slice(&(5 + packed.len() as u32).to_be_bytes());
        section.push(7);
        section.extend_from_slice(&packed);
        section
    }

    fn present_values(&self) -> impl Iterator<Item = f32> + '_ {
        let factor = 10f32.powi(self.decimal_scale as i32);
        self.data_values
            .iter()
            .filter(|v| !v.is_nan())
            .map(move |v| v * factor)
    }

    /// value = (R + X * 2^E) * 10^-D, so X = (value * 10^D - R) / 2^E
    fn packing_params(&self) -> PackingParams {
        let (min, max) = self
            .present_values()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() {
            return PackingParams {
                reference: 0.0,
                binary_scale: 0,
                bits: 0,
            };
        }

        let range = max - min;
        if range == 0.0 {
            PackingParams {
                reference: min,
                binary_scale: 0,
                bits: 0,
            }
        } else {
            PackingParams {
                reference: min,
                binary_scale: (range / 65535.0).log2().ceil() as i16,
                bits: 16,
            }
        }
    }

    fn packed_integers(&self) -> Vec<u16> {
        let params = self.packing_params();
        if params.bits == 0 {
            return Vec::new();
        }
        let scale = 2f32.powi(params.binary_scale as i32);
        self.present_values()
            .map(|v| ((v - params.reference) / scale).round().clamp(0.0, 65535.0) as u16)
            .collect()
    }

    fn pack_simple(&self) -> Vec<u8> {
        self.packed_integers()
            .into_iter()
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    fn pack_png(&self) -> Vec<u8> {
        let samples = self.packed_integers();
        if samples.is_empty() {
            return Vec::new();
        }
        let width = samples.len() as u32;
        let image = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(width, 1, samples)
            .expect("sample count matches image size");
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma16(image)
            .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .expect("PNG encoding to memory");
        png
    }
}

struct PackingParams {
    reference: f32,
    binary_scale: i16,
    bits: u8,
}

/// Gzip `data` with default compression.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("writing to memory");
    encoder.finish().expect("finishing gzip stream")
}

fn step(from: f64, to: f64, count: u32) -> f64 {
    if count > 1 {
        (to - from).abs() / (count - 1) as f64
    } else {
        0.0
    }
}

fn micro(degrees: f64) -> i64 {
    (degrees * 1e6).round() as i64
}

fn to_east_positive(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// GRIB2 sign-magnitude encoding
fn signed32(value: i64) -> [u8; 4] {
    let magnitude = value.unsigned_abs() as u32 & 0x7FFF_FFFF;
    let raw = if value < 0 { magnitude | 0x8000_0000 } else { magnitude };
    raw.to_be_bytes()
}

fn signed16(value: i16) -> [u8; 2] {
    let magnitude = value.unsigned_abs() & 0x7FFF;
    let raw = if value < 0 { magnitude | 0x8000 } else { magnitude };
    raw.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_mrms_message() {
        let data = Grib2Builder::new_mrms().build();

        assert_eq!(&data[0..4], b"GRIB");
        assert_eq!(data[6], 209);
        assert_eq!(data[7], 2);
        assert_eq!(&data[data.len() - 4..], b"7777");

        let length = u64::from_be_bytes(data[8..16].try_into().unwrap());
        assert_eq!(length as usize, data.len());
    }

    #[test]
    fn test_sign_magnitude() {
        assert_eq!(signed32(-5), [0x80, 0, 0, 5]);
        assert_eq!(signed32(5), [0, 0, 0, 5]);
        assert_eq!(signed16(-9), [0x80, 9]);
    }

    #[test]
    fn test_bitmap_written_for_nan() {
        let builder = Grib2Builder::new_mrms()
            .with_grid(3, 1)
            .with_data(vec![1.0, f32::NAN, 2.0]);
        let section = builder.build_section6();
        assert_eq!(section[5], 0);
        assert_eq!(section[6], 0b1010_0000);
    }

    #[test]
    fn test_gzip_magic() {
        let compressed = gzip(b"hello");
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    }
}
