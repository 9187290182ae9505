//! PNG encoding for palette-indexed image data.
//!
//! Frames are encoded as indexed PNG (color type 3): one palette index per
//! pixel, a PLTE chunk with the colors and a tRNS chunk with their alpha.
//! Text metadata is written as uncompressed `tEXt` chunks.

use std::io::Write;

use crate::colormap::Color;
use crate::RenderError;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Maximum colors for indexed PNG (PNG8)
pub const MAX_PALETTE_SIZE: usize = 256;

/// Create an indexed PNG (color type 3) from palette and indices.
///
/// `text` entries are written before the image data as `tEXt` chunks.
/// Keywords must be 1-79 Latin-1 characters without NUL.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[Color],
    indices: &[u8],
    text: &[(&str, &str)],
) -> Result<Vec<u8>, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    if indices.len() != width * height {
        return Err(RenderError::Encoding(format!(
            "{} indices for a {}x{} image",
            indices.len(),
            width,
            height
        )));
    }
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(RenderError::Encoding(format!(
            "Palette size {} out of range",
            palette.len()
        )));
    }

    let mut png = Vec::with_capacity(indices.len() / 4 + 1024);
    png.extend_from_slice(&SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth (8 bits per palette index)
    ihdr_data.push(3); // color type 3 = indexed
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    for (keyword, value) in text {
        write_chunk(&mut png, b"tEXt", &text_chunk(keyword, value)?);
    }

    // PLTE chunk (palette)
    let plte_data: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS chunk (transparency) - only if any color has alpha < 255
    if palette.iter().any(|c| c.a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|c| c.a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    // IDAT chunk (image data)
    let idat_data = deflate_idat_indexed(indices, width, height)
        .map_err(|e| RenderError::Encoding(format!("IDAT compression failed: {}", e)))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    // IEND chunk
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn text_chunk(keyword: &str, value: &str) -> Result<Vec<u8>, RenderError> {
    let valid_keyword = (1..=79).contains(&keyword.len())
        && keyword.bytes().all(|b| b != 0 && b.is_ascii());
    if !valid_keyword || value.bytes().any(|b| b == 0) {
        return Err(RenderError::Encoding(format!(
            "Invalid tEXt entry {:?}",
            keyword
        )));
    }

    let mut data = Vec::with_capacity(keyword.len() + 1 + value.len());
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);
    data.extend_from_slice(value.as_bytes());
    Ok(data)
}

/// Deflate indexed image data for IDAT chunk.
fn deflate_idat_indexed(
    indices: &[u8],
    width: usize,
    height: usize,
) -> Result<Vec<u8>, std::io::Error> {
    // Each scanline is: filter byte (0 = none) + width index bytes
    let mut uncompressed = Vec::with_capacity(height * (1 + width));
    for row in indices.chunks_exact(width) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Read the `tEXt` entries of a PNG, in file order.
pub fn read_text_chunks(png: &[u8]) -> Result<Vec<(String, String)>, RenderError> {
    if png.len() < SIGNATURE.len() || png[..SIGNATURE.len()] != SIGNATURE {
        return Err(RenderError::Encoding("Not a PNG stream".to_string()));
    }

    let mut entries = Vec::new();
    let mut offset = SIGNATURE.len();
    while offset + 12 <= png.len() {
        let length = u32::from_be_bytes([
            png[offset],
            png[offset + 1],
            png[offset + 2],
            png[offset + 3],
        ]) as usize;
        let chunk_type = &png[offset + 4..offset + 8];
        let data_end = offset + 8 + length;
        if data_end + 4 > png.len() {
            return Err(RenderError::Encoding("Truncated PNG chunk".to_string()));
        }

        if chunk_type == b"tEXt" {
            let data = &png[offset + 8..data_end];
            if let Some(split) = data.iter().position(|&b| b == 0) {
                entries.push((
                    String::from_utf8_lossy(&data[..split]).into_owned(),
                    String::from_utf8_lossy(&data[split + 1..]).into_owned(),
                ));
            }
        }
        if chunk_type == b"IEND" {
            break;
        }
        offset = data_end + 4;
    }

    Ok(entries)
}
