//! Grid to image rasterization.
//!
//! The grid is stretched over the whole image with nearest-cell sampling at
//! pixel centres. Grid row 0 is the southern edge and lands on the bottom
//! image row; the image carries no padding or axes, so its corners are the
//! geographic bounds exactly.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use radar_common::GeoBounds;

use crate::colormap::{Colormap, ValueRange};
use crate::png::create_png_indexed;
use crate::RenderError;

/// Keyword of the PNG text chunk holding `south,west,north,east`.
pub const BOUNDS_KEYWORD: &str = "bounds";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub width: usize,
    pub height: usize,
    pub range: ValueRange,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 1500,
            height: 900,
            range: ValueRange::REFLECTIVITY,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 || self.width > 16384 || self.height > 16384 {
            return Err(RenderError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !self.range.is_valid() {
            return Err(RenderError::InvalidRange {
                min: self.range.min,
                max: self.range.max,
            });
        }
        Ok(())
    }
}

/// An encoded frame and the extent it covers.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub png: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub bounds: GeoBounds,
}

/// Renders reflectivity grids with a fixed colormap and output size.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    options: RenderOptions,
    colormap: Colormap,
}

impl Rasterizer {
    pub fn new(options: RenderOptions) -> Result<Self, RenderError> {
        options.validate()?;
        Ok(Self {
            colormap: Colormap::turbo(options.range),
            options,
        })
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    /// Palette indices for every image pixel, top row first.
    pub fn rasterize(
        &self,
        values: &[f32],
        grid_width: usize,
        grid_height: usize,
    ) -> Result<Vec<u8>, RenderError> {
        if grid_width == 0 || grid_height == 0 || values.len() != grid_width * grid_height {
            return Err(RenderError::InvalidGrid(format!(
                "{} values for a {}x{} grid",
                values.len(),
                grid_width,
                grid_height
            )));
        }

        let (width, height) = (self.options.width, self.options.height);
        let columns: Vec<usize> = (0..width)
            .map(|px| sample_index(px, width, grid_width))
            .collect();

        let mut indices = vec![0u8; width * height];
        indices
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(py, out)| {
                // Top image row samples the northernmost grid row
                let data_row = grid_height - 1 - sample_index(py, height, grid_height);
                let row = &values[data_row * grid_width..(data_row + 1) * grid_width];
                for (pixel, &col) in out.iter_mut().zip(&columns) {
                    *pixel = self.colormap.index_for(row[col]);
                }
            });

        Ok(indices)
    }

    /// Render and encode a grid. `bounds` is embedded in the PNG.
    pub fn render(
        &self,
        values: &[f32],
        grid_width: usize,
        grid_height: usize,
        bounds: GeoBounds,
    ) -> Result<RenderedImage, RenderError> {
        let indices = self.rasterize(values, grid_width, grid_height)?;
        let bounds_text = bounds.to_csv();
        let png = create_png_indexed(
            self.options.width,
            self.options.height,
            self.colormap.palette(),
            &indices,
            &[(BOUNDS_KEYWORD, bounds_text.as_str())],
        )?;

        debug!(
            grid_width,
            grid_height,
            width = self.options.width,
            height = self.options.height,
            bytes = png.len(),
            "Rendered frame"
        );

        Ok(RenderedImage {
            png,
            width: self.options.width,
            height: self.options.height,
            bounds,
        })
    }
}

/// Grid cell under the centre of pixel `pixel` when `pixels` span `cells`.
#[inline]
fn sample_index(pixel: usize, pixels: usize, cells: usize) -> usize {
    let index = ((pixel as f64 + 0.5) * cells as f64 / pixels as f64).floor() as usize;
    index.min(cells - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(width: usize, height: usize) -> Rasterizer {
        Rasterizer::new(RenderOptions {
            width,
            height,
            ..RenderOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn test_sample_index() {
        // 4 pixels over 2 cells
        assert_eq!(sample_index(0, 4, 2), 0);
        assert_eq!(sample_index(1, 4, 2), 0);
        assert_eq!(sample_index(2, 4, 2), 1);
        assert_eq!(sample_index(3, 4, 2), 1);
        // Downsampling 3 pixels over 9 cells hits the middle cells
        assert_eq!(sample_index(0, 3, 9), 1);
        assert_eq!(sample_index(2, 3, 9), 7);
    }

    #[test]
    fn test_south_row_is_bottom() {
        let r = small(2, 2);
        // Row 0 (south): NaN, row 1 (north): 75
        let indices = r.rasterize(&[f32::NAN, f32::NAN, 75.0, 75.0], 2, 2).unwrap();
        assert_eq!(indices, vec![255, 255, 0, 0]);
    }

    #[test]
    fn test_rejects_mismatched_grid() {
        let r = small(2, 2);
        assert!(matches!(
            r.rasterize(&[1.0; 3], 2, 2),
            Err(RenderError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_invalid_options() {
        let options = RenderOptions {
            width: 0,
            ..RenderOptions::default()
        };
        assert!(Rasterizer::new(options).is_err());

        let options = RenderOptions {
            range: ValueRange { min: 10.0, max: -10.0 },
            ..RenderOptions::default()
        };
        assert!(matches!(
            Rasterizer::new(options),
            Err(RenderError::InvalidRange { .. })
        ));
    }
}
