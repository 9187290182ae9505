//! GRIB2 data unpacking algorithms.
//!
//! Implements the packing methods MRMS and NCEP radar products use:
//! - Simple packing (template 5.0)
//! - PNG packing (template 5.41)
//!
//! Both produce one `f32` per grid point; points masked out by the bitmap are
//! `NaN`.

use crate::Grib2Error;

/// Scaling parameters shared by simple and PNG packing.
///
/// value = (reference_value + packed_value * 2^binary_scale) * 10^(-decimal_scale)
#[derive(Debug, Clone, Copy)]
pub struct PackingParams {
    pub reference_value: f32,
    pub binary_scale_factor: i16,
    pub decimal_scale_factor: i16,
    pub bits_per_value: u8,
}

impl PackingParams {
    #[inline]
    fn scale(&self, packed: u32) -> f32 {
        let binary_scale = 2.0_f64.powi(self.binary_scale_factor as i32);
        let decimal_scale = 10.0_f64.powi(-(self.decimal_scale_factor as i32));
        ((self.reference_value as f64 + packed as f64 * binary_scale) * decimal_scale) as f32
    }

    fn scaler(&self) -> impl Fn(u32) -> f32 {
        let binary_scale = 2.0_f64.powi(self.binary_scale_factor as i32);
        let decimal_scale = 10.0_f64.powi(-(self.decimal_scale_factor as i32));
        let reference = self.reference_value as f64;
        move |packed| ((reference + packed as f64 * binary_scale) * decimal_scale) as f32
    }
}

/// Unpack simple packed GRIB2 data (template 5.0).
///
/// `num_points` is the full grid size. When a bitmap is present the packed
/// stream only holds values for points whose bit is set.
pub fn unpack_simple(
    packed_data: &[u8],
    num_points: usize,
    params: &PackingParams,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    if params.bits_per_value == 0 {
        // All present values are the reference value
        let constant = params.scale(0);
        return Ok(scatter(num_points, bitmap, std::iter::repeat(constant)));
    }

    if params.bits_per_value > 32 {
        return Err(Grib2Error::UnpackingError(format!(
            "Invalid bits per value: {}",
            params.bits_per_value
        )));
    }

    let bits = params.bits_per_value as usize;
    let present = count_present(num_points, bitmap);
    let available = packed_data.len() * 8 / bits;
    if available < present {
        return Err(Grib2Error::UnpackingError(format!(
            "Packed data holds {} values, {} required",
            available, present
        )));
    }

    let scale = params.scaler();
    let values = (0..present).map(|n| {
        // bounds were checked above
        let packed = extract_bits(packed_data, n * bits, bits).unwrap_or(0);
        scale(packed)
    });

    Ok(scatter(num_points, bitmap, values))
}

/// Unpack PNG packed GRIB2 data (template 5.41).
///
/// The data section holds a PNG image whose samples are the packed integers,
/// 8 or 16 bit grayscale, or 24/32 bit RGB(A) for wide values.
pub fn unpack_png(
    packed_data: &[u8],
    num_points: usize,
    params: &PackingParams,
    bitmap: Option<&[u8]>,
) -> Result<Vec<f32>, Grib2Error> {
    if params.bits_per_value == 0 {
        let constant = params.scale(0);
        return Ok(scatter(num_points, bitmap, std::iter::repeat(constant)));
    }

    let image = image::load_from_memory_with_format(packed_data, image::ImageFormat::Png)
        .map_err(|e| Grib2Error::UnpackingError(format!("Invalid PNG payload: {}", e)))?;

    let packed: Vec<u32> = match (params.bits_per_value, image) {
        (8, image::DynamicImage::ImageLuma8(img)) => {
            img.into_raw().into_iter().map(u32::from).collect()
        }
        (16, image::DynamicImage::ImageLuma16(img)) => {
            img.into_raw().into_iter().map(u32::from).collect()
        }
        (24, image::DynamicImage::ImageRgb8(img)) => img
            .into_raw()
            .chunks_exact(3)
            .map(|p| (p[0] as u32) << 16 | (p[1] as u32) << 8 | p[2] as u32)
            .collect(),
        (32, image::DynamicImage::ImageRgba8(img)) => img
            .into_raw()
            .chunks_exact(4)
            .map(|p| u32::from_be_bytes([p[0], p[1], p[2], p[3]]))
            .collect(),
        (bits, other) => {
            return Err(Grib2Error::UnsupportedPacking(format!(
                "PNG packing with {} bits per value as {:?}",
                bits,
                other.color()
            )))
        }
    };

    let present = count_present(num_points, bitmap);
    if packed.len() < present {
        return Err(Grib2Error::UnpackingError(format!(
            "PNG holds {} values, {} required",
            packed.len(),
            present
        )));
    }

    let scale = params.scaler();
    Ok(scatter(
        num_points,
        bitmap,
        packed.into_iter().take(present).map(scale),
    ))
}

/// Spread present values over the grid, writing NaN where the bitmap bit is 0.
fn scatter<I>(num_points: usize, bitmap: Option<&[u8]>, mut values: I) -> Vec<f32>
where
    I: Iterator<Item = f32>,
{
    let mut out = Vec::with_capacity(num_points);
    for i in 0..num_points {
        let value = if is_present(bitmap, i) {
            values.next().unwrap_or(f32::NAN)
        } else {
            f32::NAN
        };
        out.push(value);
    }
    out
}

/// Bitmap: 1 bit per data point, 1 = value present, 0 = missing
#[inline]
fn is_present(bitmap: Option<&[u8]>, i: usize) -> bool {
    match bitmap {
        Some(bm) => bm
            .get(i / 8)
            .map(|byte| (byte >> (7 - (i % 8))) & 1 == 1)
            .unwrap_or(false),
        None => true,
    }
}

fn count_present(num_points: usize, bitmap: Option<&[u8]>) -> usize {
    match bitmap {
        Some(_) => (0..num_points).filter(|&i| is_present(bitmap, i)).count(),
        None => num_points,
    }
}

/// Extract bits from a byte array (MSB first).
/// Returns the bits as a 32-bit unsigned integer
fn extract_bits(data: &[u8], start_bit: usize, num_bits: usize) -> Result<u32, String> {
    if num_bits > 32 || num_bits == 0 {
        return Err(format!("Invalid number of bits: {}", num_bits));
    }

    let first_byte = start_bit / 8;
    let last_byte = (start_bit + num_bits - 1) / 8;
    if last_byte >= data.len() {
        return Err("Not enough data to extract bits".to_string());
    }

    // At most 5 bytes cover 32 bits at any bit offset
    let window = data[first_byte..=last_byte]
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64);
    let window_bits = (last_byte - first_byte + 1) * 8;
    let shift = window_bits - (start_bit % 8) - num_bits;
    let mask = (1u64 << num_bits) - 1;

    Ok(((window >> shift) & mask) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(reference_value: f32, e: i16, d: i16, bits: u8) -> PackingParams {
        PackingParams {
            reference_value,
            binary_scale_factor: e,
            decimal_scale_factor: d,
            bits_per_value: bits,
        }
    }

    #[test]
    fn test_extract_bits() {
        // Test with simple byte: 0b10110101
        let data = vec![0b10110101];

        // Extract first 2 bits (should be 0b10 = 2)
        assert_eq!(extract_bits(&data, 0, 2).unwrap(), 0b10);

        // Extract bits 2-4 (should be 0b11 = 3)
        assert_eq!(extract_bits(&data, 2, 2).unwrap(), 0b11);

        // Extract all 8 bits
        assert_eq!(extract_bits(&data, 0, 8).unwrap(), 0b10110101);
    }

    #[test]
    fn test_extract_bits_across_bytes() {
        let data = vec![0b0000_0011, 0b1100_0000];
        assert_eq!(extract_bits(&data, 6, 4).unwrap(), 0b1111);
        assert!(extract_bits(&data, 12, 8).is_err());
    }

    #[test]
    fn test_simple_unpacking() {
        // 2 data points, 8 bits per value
        let values = unpack_simple(&[100, 200], 2, &params(0.0, 0, 0, 8), None).unwrap();
        assert_eq!(values.len(), 2);
        assert!((values[0] - 100.0).abs() < 0.1);
        assert!((values[1] - 200.0).abs() < 0.1);
    }

    #[test]
    fn test_simple_unpacking_scales() {
        // (R + X * 2^1) * 10^-1 with R = 10
        let values = unpack_simple(&[3], 1, &params(10.0, 1, 1, 8), None).unwrap();
        assert!((values[0] - 1.6).abs() < 1e-5);
    }

    #[test]
    fn test_bitmap_skips_missing_points() {
        // Points 0 and 2 present, 1 missing; packed stream has two values
        let bitmap = [0b1010_0000];
        let values = unpack_simple(&[7, 9], 3, &params(0.0, 0, 0, 8), Some(&bitmap)).unwrap();
        assert_eq!(values[0], 7.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 9.0);
    }

    #[test]
    fn test_zero_bits_is_constant_field() {
        let values = unpack_simple(&[], 4, &params(-5.0, 0, 0, 0), None).unwrap();
        assert_eq!(values, vec![-5.0; 4]);
    }

    #[test]
    fn test_short_packed_data_is_error() {
        let result = unpack_simple(&[1], 4, &params(0.0, 0, 0, 8), None);
        assert!(matches!(result, Err(Grib2Error::UnpackingError(_))));
    }

    #[test]
    fn test_png_unpacking_16_bit() {
        let img = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::from_raw(
            2,
            1,
            vec![10, 300],
        )
        .unwrap();
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma16(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let values = unpack_png(&png, 2, &params(0.0, 0, 1, 16), None).unwrap();
        assert!((values[0] - 1.0).abs() < 1e-5);
        assert!((values[1] - 30.0).abs() < 1e-4);
    }
}
