//! Reflectivity grid generators.
//!
//! Grids are row-major with row 0 first. Whether row 0 is north or south is
//! up to the caller; the builders in [`crate::grib2`] take values in file
//! scan order.

/// Creates a single storm cell: reflectivity peaks at `peak` dBZ in the
/// centre and falls off linearly to the `background` value at the edges.
pub fn create_storm_cell(width: usize, height: usize, peak: f32, background: f32) -> Vec<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let radius = cx.max(cy).max(1.0);

    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f32 - cx;
            let dy = row as f32 - cy;
            let distance = (dx * dx + dy * dy).sqrt() / radius;
            let value = peak - (peak - background) * distance.min(1.0);
            data.push(value);
        }
    }
    data
}

/// Creates a grid with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replaces every `stride`-th value with `sentinel`.
pub fn with_sentinels(mut data: Vec<f32>, stride: usize, sentinel: f32) -> Vec<f32> {
    for value in data.iter_mut().step_by(stride.max(1)) {
        *value = sentinel;
    }
    data
}
