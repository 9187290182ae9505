//! Turbo colormap quantized to a 256-entry palette.
//!
//! Index 0 is fully transparent and marks masked cells. Indices 1..=255
//! sample turbo evenly from the low end of the scale to the high end.

use serde::{Deserialize, Serialize};

/// Color value in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn transparent() -> Self {
        Self { r: 0, g: 0, b: 0, a: 0 }
    }
}

/// Palette index used for NaN cells.
pub const MASKED_INDEX: u8 = 0;

const COLOR_STEPS: usize = 255;

/// Turbo (Mikhailov 2019), polynomial approximation over t in [0, 1].
pub fn turbo(t: f32) -> Color {
    let t = t.clamp(0.0, 1.0) as f64;
    let r = 0.13572138
        + t * (4.61539260
            + t * (-42.66032258 + t * (132.13108234 + t * (-152.94239396 + t * 59.28637943))));
    let g = 0.09140261
        + t * (2.19418839
            + t * (4.84296658 + t * (-14.18503333 + t * (4.27729857 + t * 2.82956604))));
    let b = 0.10667330
        + t * (12.64194608
            + t * (-60.58204836 + t * (110.36276771 + t * (-89.90310912 + t * 27.34824973))));

    let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color::new(channel(r), channel(g), channel(b), 255)
}

/// Value range mapped onto the color scale. Values outside are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    /// Reflectivity scale in dBZ.
    pub const REFLECTIVITY: ValueRange = ValueRange {
        min: -32.0,
        max: 75.0,
    };

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    /// Position of `value` on the scale, clamped to [0, 1].
    pub fn normalize(&self, value: f32) -> f32 {
        ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::REFLECTIVITY
    }
}

/// Precomputed turbo palette for a value range.
#[derive(Debug, Clone)]
pub struct Colormap {
    range: ValueRange,
    palette: Vec<Color>,
}

impl Colormap {
    pub fn turbo(range: ValueRange) -> Self {
        let mut palette = Vec::with_capacity(COLOR_STEPS + 1);
        palette.push(Color::transparent());
        for i in 0..COLOR_STEPS {
            palette.push(turbo(i as f32 / (COLOR_STEPS - 1) as f32));
        }
        Self { range, palette }
    }

    pub fn range(&self) -> ValueRange {
        self.range
    }

    pub fn palette(&self) -> &[Color] {
        &self.palette
    }

    /// Palette index for a value; NaN and infinities map to [`MASKED_INDEX`].
    #[inline]
    pub fn index_for(&self, value: f32) -> u8 {
        if !value.is_finite() {
            return MASKED_INDEX;
        }
        let t = self.range.normalize(value);
        1 + (t * (COLOR_STEPS - 1) as f32).round() as u8
    }
}
