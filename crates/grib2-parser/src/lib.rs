//! GRIB2 parser implementation (WMO FM 92 GRIB Edition 2).
//!
//! This crate provides a pure Rust reader for GRIB2 files as published by
//! MRMS and NCEP. [`Grib2Reader`] walks the messages of a file, and
//! [`dataset::decode`] turns a whole file into a [`DecodedGrid`]: named 2-D
//! fields plus latitude/longitude axes.

pub mod dataset;
pub mod sections;
pub mod tables;
pub mod unpacking;

use std::collections::VecDeque;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

pub use dataset::{decode, CoordinateAxis, DecodedGrid, FieldMetadata, GridField};
pub use tables::{Grib2Tables, LevelDescription};

use sections::{
    Bitmap, DataRepresentation, DataSection, GridDefinition, Identification, ProductDefinition,
};
use unpacking::PackingParams;

#[derive(Debug, Error)]
pub enum Grib2Error {
    #[error("Invalid GRIB2 format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section {section}: {reason}")]
    InvalidSection { section: u8, reason: String },

    #[error("Unpacking failed: {0}")]
    UnpackingError(String),

    #[error("Unsupported packing: {0}")]
    UnsupportedPacking(String),

    #[error("Unsupported grid: {0}")]
    UnsupportedGrid(String),

    #[error("No usable fields in GRIB2 data")]
    NoFields,
}

/// One field of a GRIB2 file: the sections needed to unpack a single grid.
#[derive(Debug, Clone)]
pub struct Grib2Message {
    pub discipline: u8,
    pub identification: Identification,
    pub grid_definition: GridDefinition,
    pub product_definition: ProductDefinition,
    pub data_representation: DataRepresentation,
    /// Bitmap bits when the field has missing points.
    pub bitmap: Option<Bytes>,
    pub data: DataSection,
    pub parameter_name: String,
    pub level_description: String,
}

impl Grib2Message {
    /// Unpack the field into one value per grid point, in file scan order.
    /// Missing points are NaN.
    pub fn unpack_data(&self) -> Result<Vec<f32>, Grib2Error> {
        let repr = &self.data_representation;
        let num_points = self.grid_definition.num_data_points as usize;
        let params = PackingParams {
            reference_value: repr.reference_value,
            binary_scale_factor: repr.binary_scale_factor,
            decimal_scale_factor: repr.decimal_scale_factor,
            bits_per_value: repr.bits_per_value,
        };
        let bitmap = self.bitmap.as_deref();

        match repr.template {
            0 => unpacking::unpack_simple(&self.data.data, num_points, &params, bitmap),
            41 => unpacking::unpack_png(&self.data.data, num_points, &params, bitmap),
            other => Err(Grib2Error::UnsupportedPacking(format!(
                "Data representation template 5.{}",
                other
            ))),
        }
    }
}

/// Sequential reader over the messages in a GRIB2 byte buffer.
pub struct Grib2Reader {
    data: Bytes,
    offset: usize,
    tables: Grib2Tables,
    pending: VecDeque<Grib2Message>,
}

impl Grib2Reader {
    pub fn new(data: Bytes, tables: Grib2Tables) -> Self {
        Self {
            data,
            offset: 0,
            tables,
            pending: VecDeque::new(),
        }
    }

    /// Next field, or `None` when no further `GRIB` indicator exists.
    ///
    /// Bytes between messages (padding, trailing garbage) are skipped.
    pub fn next_message(&mut self) -> Result<Option<Grib2Message>, Grib2Error> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }

            let Some(start) = find_magic(&self.data, self.offset) else {
                self.offset = self.data.len();
                return Ok(None);
            };

            let indicator = sections::parse_indicator(&self.data[start..])?;
            let length = usize::try_from(indicator.message_length)
                .map_err(|_| Grib2Error::InvalidFormat("Message length overflow".to_string()))?;
            let end = start
                .checked_add(length)
                .filter(|&end| end <= self.data.len() && length >= 20)
                .ok_or_else(|| {
                    Grib2Error::InvalidFormat(format!(
                        "Message at offset {} claims {} bytes, {} available",
                        start,
                        length,
                        self.data.len() - start
                    ))
                })?;

            if &self.data[end - 4..end] != b"7777" {
                return Err(Grib2Error::InvalidFormat(format!(
                    "Message at offset {} is missing its end marker",
                    start
                )));
            }

            self.offset = end;
            let message = self.data.slice(start..end);
            let fields = self.parse_fields(&message, indicator.discipline)?;
            debug!(offset = start, length, fields = fields.len(), "Read GRIB2 message");
            self.pending.extend(fields);
        }
    }

    /// A message may repeat sections 3-7 (or 4-7) for several fields.
    fn parse_fields(&self, message: &[u8], discipline: u8) -> Result<Vec<Grib2Message>, Grib2Error> {
        let mut fields = Vec::new();
        let mut identification = None;
        let mut grid = None;
        let mut product = None;
        let mut representation = None;
        let mut bitmap: Option<Bytes> = None;
        let mut last_bitmap: Option<Bytes> = None;

        for section in sections::SectionIter::new(message) {
            let (number, bytes) = section?;
            match number {
                1 => identification = Some(sections::parse_identification(bytes)?),
                2 => {} // local use
                3 => grid = Some(sections::parse_grid_definition(bytes)?),
                4 => product = Some(sections::parse_product_definition(bytes)?),
                5 => representation = Some(sections::parse_data_representation(bytes)?),
                6 => {
                    bitmap = match sections::parse_bitmap(bytes)? {
                        Bitmap::None => None,
                        Bitmap::Present(bits) => {
                            last_bitmap = Some(bits.clone());
                            Some(bits)
                        }
                        Bitmap::PreviouslyDefined => Some(last_bitmap.clone().ok_or_else(|| {
                            Grib2Error::InvalidSection {
                                section: 6,
                                reason: "References a bitmap that was never defined".to_string(),
                            }
                        })?),
                    }
                }
                7 => {
                    let missing = |section: u8| Grib2Error::InvalidSection {
                        section,
                        reason: "Required section missing before data section".to_string(),
                    };
                    let identification = identification.clone().ok_or_else(|| missing(1))?;
                    let grid_definition: GridDefinition = grid.clone().ok_or_else(|| missing(3))?;
                    let product_definition: ProductDefinition =
                        product.clone().ok_or_else(|| missing(4))?;
                    let data_representation = representation.clone().ok_or_else(|| missing(5))?;

                    let parameter_name = self.tables.get_parameter_name(
                        discipline,
                        product_definition.parameter_category,
                        product_definition.parameter_number,
                    );
                    let level_description = self.tables.get_level_description(
                        product_definition.level_type,
                        product_definition.level_value,
                    );

                    fields.push(Grib2Message {
                        discipline,
                        identification,
                        grid_definition,
                        product_definition,
                        data_representation,
                        bitmap: bitmap.clone(),
                        data: sections::parse_data_section(bytes)?,
                        parameter_name,
                        level_description,
                    });
                }
                other => debug!(section = other, "Skipping unknown GRIB2 section"),
            }
        }

        Ok(fields)
    }
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(4)
        .position(|w| w == b"GRIB")
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_on_non_grib_data() {
        let mut reader = Grib2Reader::new(Bytes::from_static(b"not a grib file"), Grib2Tables::new());
        assert!(reader.next_message().unwrap().is_none());
    }

    #[test]
    fn test_reader_rejects_truncated_message() {
        let mut data = b"GRIB\0\0\0\x02".to_vec();
        data.extend_from_slice(&1000u64.to_be_bytes());
        data.extend_from_slice(b"7777");
        let mut reader = Grib2Reader::new(Bytes::from(data), Grib2Tables::new());
        assert!(matches!(
            reader.next_message(),
            Err(Grib2Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_find_magic_skips_padding() {
        assert_eq!(find_magic(b"\0\0GRIB", 0), Some(2));
        assert_eq!(find_magic(b"GRIB", 1), None);
    }
}
