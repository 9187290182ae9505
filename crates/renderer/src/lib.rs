//! Rendering of decoded radar grids to georeferenced PNG frames.
//!
//! - [`colormap`]: turbo palette over a fixed value range
//! - [`raster`]: nearest-cell rasterization, south edge at the bottom
//! - [`png`]: indexed PNG encoding with text metadata

pub mod colormap;
pub mod png;
pub mod raster;

use thiserror::Error;

pub use colormap::{Color, Colormap, ValueRange};
pub use raster::{Rasterizer, RenderOptions, RenderedImage, BOUNDS_KEYWORD};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Invalid value range [{min}, {max}]")]
    InvalidRange { min: f32, max: f32 },

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("PNG encoding failed: {0}")]
    Encoding(String),
}
