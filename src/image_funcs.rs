// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use image::{ImageBuffer, Luma};
use log::debug;

use crate::error::{Dims, RegistrationError, Result};

/// A single 2-D intensity image. Intensities are real valued; planes loaded
/// from integer image files are normalized to [0, 1].
pub type Plane = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Returns `ShapeMismatch` if `plane` is not `expected` in size. `context` is
/// carried into the error for diagnosis.
pub fn check_shape(plane: &Plane, expected: Dims, context: &str) -> Result<()> {
    let found = plane.dimensions();
    if found != expected {
        return Err(RegistrationError::ShapeMismatch {
            context: context.to_string(), expected, found });
    }
    Ok(())
}

/// Reduces planes depicting the same field to one plane by taking, at each
/// pixel, the maximum over all inputs (max-intensity projection).
///
/// # Returns
/// `Ok(None)` if `planes` is empty: there were no source planes, which the
/// caller should treat as "absent" rather than as a zero-filled plane.
///
/// # Errors
/// `ShapeMismatch` if the planes do not all share the first plane's
/// dimensions.
pub fn max_intensity_projection(planes: &[Plane]) -> Result<Option<Plane>> {
    let Some((first, rest)) = planes.split_first() else {
        return Ok(None);
    };
    let mut projection = first.clone();
    for (index, plane) in rest.iter().enumerate() {
        check_shape(plane, first.dimensions(),
                    &format!("projection input {}", index + 1))?;
        max_merge_into(&mut projection, plane);
    }
    debug!("Projected {} planes of {:?}", planes.len(), first.dimensions());
    Ok(Some(projection))
}

/// Element-wise maximum of `other` into `accum`. Both must share dimensions.
pub fn max_merge_into(accum: &mut Plane, other: &Plane) {
    debug_assert_eq!(accum.dimensions(), other.dimensions());
    for (a, b) in accum.iter_mut().zip(other.as_raw().iter()) {
        *a = a.max(*b);
    }
}

/// Mean pixel value of `plane`, accumulated in f64. Zero for an empty plane.
pub fn mean_intensity(plane: &Plane) -> f64 {
    let pixels = plane.as_raw();
    if pixels.is_empty() {
        return 0.0;
    }
    pixels.iter().map(|&v| v as f64).sum::<f64>() / pixels.len() as f64
}

/// Returns the pixels of `plane` in row-major order, each with the plane's
/// mean intensity subtracted.
pub fn mean_centered(plane: &Plane) -> Vec<f64> {
    let mean = mean_intensity(plane);
    plane.as_raw().iter().map(|&v| v as f64 - mean).collect()
}

/// Translates `plane` by `rows` (downward) and `cols` (rightward), resampling
/// with bilinear interpolation. The result satisfies
/// `out(x, y) = plane(x - cols, y - rows)`; pixels whose pre-image falls
/// outside `plane` are zero. For integral shifts the interpolation weights
/// collapse to a single source pixel, so values are copied exactly.
pub fn shift_plane(plane: &Plane, rows: f64, cols: f64) -> Plane {
    let (width, height) = plane.dimensions();
    let sample = |x: i64, y: i64| -> f64 {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            0.0
        } else {
            plane.get_pixel(x as u32, y as u32).0[0] as f64
        }
    };
    Plane::from_fn(width, height, |x, y| {
        let src_x = x as f64 - cols;
        let src_y = y as f64 - rows;
        let x0 = src_x.floor();
        let y0 = src_y.floor();
        let fx = src_x - x0;
        let fy = src_y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let mut value = 0.0;
        // Zero-weight taps are skipped so that integral shifts read exactly
        // one source pixel.
        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            if wy == 0.0 {
                continue;
            }
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                if wx == 0.0 {
                    continue;
                }
                value += wx * wy * sample(x0 + dx, y0 + dy);
            }
        }
        Luma([value as f32])
    })
}

// mod tests.
