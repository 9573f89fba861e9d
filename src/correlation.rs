// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

//! Linear cross-correlation of two equally sized planes, evaluated with FFTs.
//!
//! The correlation surface uses the "same size, centered" layout: surface
//! index `(row, col)` holds the correlation at lag
//! `(row - height / 2, col - width / 2)`, so the center index corresponds to
//! zero displacement for both odd and even plane sizes. The value at lag `s`
//! is `sum_n reference[n] * moving[n - s]`, which peaks where `moving` shifted
//! by `s` best matches `reference`.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::error::{Dims, Result};
use crate::image_funcs::{check_shape, mean_centered, Plane};

/// Correlation values laid out in row-major order, `width * height` entries.
#[derive(Debug)]
pub struct CorrelationSurface {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f64>,
}

impl CorrelationSurface {
    /// Location `(row, col)` of the maximum value. Ties go to the first
    /// maximum in row-major scan order, which also defines the outcome for a
    /// flat surface (e.g. a uniform plane): `(0, 0)`. An empty surface also
    /// yields `(0, 0)`.
    pub fn peak(&self) -> (usize, usize) {
        if self.values.is_empty() {
            return (0, 0);
        }
        let mut best_index = 0;
        let mut best_value = f64::NEG_INFINITY;
        for (index, &value) in self.values.iter().enumerate() {
            if value > best_value {
                best_index = index;
                best_value = value;
            }
        }
        (best_index / self.width, best_index % self.width)
    }

    /// Converts a peak location to a signed displacement `(rows, cols)` by
    /// subtracting the zero-lag center index.
    pub fn displacement_at(&self, peak: (usize, usize)) -> (i32, i32) {
        (peak.0 as i32 - (self.height / 2) as i32,
         peak.1 as i32 - (self.width / 2) as i32)
    }
}

/// Correlates many planes against one fixed reference plane. The reference's
/// spectrum and the FFT plans are computed once at construction.
pub struct CrossCorrelator {
    dims: Dims,
    // Padded transform sizes. At least 2n-1 along each axis so that the
    // circular correlation does not wrap.
    padded_width: usize,
    padded_height: usize,
    row_fft: Arc<dyn Fft<f64>>,
    col_fft: Arc<dyn Fft<f64>>,
    row_ifft: Arc<dyn Fft<f64>>,
    col_ifft: Arc<dyn Fft<f64>>,
    reference_spectrum: Vec<Complex64>,
}

impl CrossCorrelator {
    /// `reference` is mean-centered before its spectrum is taken.
    pub fn new(reference: &Plane) -> CrossCorrelator {
        let dims = reference.dimensions();
        let (width, height) = (dims.0 as usize, dims.1 as usize);
        let padded_width = (2 * width).saturating_sub(1).max(1).next_power_of_two();
        let padded_height = (2 * height).saturating_sub(1).max(1).next_power_of_two();

        let mut planner = FftPlanner::<f64>::new();
        let mut correlator = CrossCorrelator {
            dims,
            padded_width,
            padded_height,
            row_fft: planner.plan_fft_forward(padded_width),
            col_fft: planner.plan_fft_forward(padded_height),
            row_ifft: planner.plan_fft_inverse(padded_width),
            col_ifft: planner.plan_fft_inverse(padded_height),
            reference_spectrum: Vec::new(),
        };
        correlator.reference_spectrum = correlator.spectrum(reference);
        correlator
    }

    /// Computes the correlation surface of the reference against `moving`.
    ///
    /// # Errors
    /// `ShapeMismatch` if `moving` differs in size from the reference.
    pub fn correlate(&self, moving: &Plane) -> Result<CorrelationSurface> {
        let start = Instant::now();
        check_shape(moving, self.dims, "cross-correlation")?;
        let (width, height) = (self.dims.0 as usize, self.dims.1 as usize);
        let (pw, ph) = (self.padded_width, self.padded_height);

        let mut product: Vec<Complex64> = self.reference_spectrum.iter()
            .zip(self.spectrum(moving))
            .map(|(r, m)| r * m.conj())
            .collect();
        self.transform(&mut product, /*inverse=*/true);
        let scale = 1.0 / (pw * ph) as f64;

        let mut values = Vec::with_capacity(width * height);
        for row in 0..height {
            let lag_row = row as isize - (height / 2) as isize;
            let pr = lag_row.rem_euclid(ph as isize) as usize;
            for col in 0..width {
                let lag_col = col as isize - (width / 2) as isize;
                let pc = lag_col.rem_euclid(pw as isize) as usize;
                values.push(product[pr * pw + pc].re * scale);
            }
        }
        debug!("Correlated {}x{} planes in {:?}", width, height, start.elapsed());
        Ok(CorrelationSurface { width, height, values })
    }

    // Zero-padded forward spectrum of the mean-centered plane.
    fn spectrum(&self, plane: &Plane) -> Vec<Complex64> {
        let width = self.dims.0 as usize;
        let pw = self.padded_width;
        let mut data = vec![Complex64::new(0.0, 0.0); pw * self.padded_height];
        for (index, value) in mean_centered(plane).into_iter().enumerate() {
            let (row, col) = (index / width, index % width);
            data[row * pw + col] = Complex64::new(value, 0.0);
        }
        self.transform(&mut data, /*inverse=*/false);
        data
    }

    // 2-D FFT by rows then columns, in place. Unnormalized.
    fn transform(&self, data: &mut [Complex64], inverse: bool) {
        let (pw, ph) = (self.padded_width, self.padded_height);
        let (row_fft, col_fft) = if inverse {
            (&self.row_ifft, &self.col_ifft)
        } else {
            (&self.row_fft, &self.col_fft)
        };
        // The buffer holds `ph` contiguous rows; process() handles each in turn.
        row_fft.process(data);

        let mut column = vec![Complex64::new(0.0, 0.0); ph];
        for col in 0..pw {
            for row in 0..ph {
                column[row] = data[row * pw + col];
            }
            col_fft.process(&mut column);
            for row in 0..ph {
                data[row * pw + col] = column[row];
            }
        }
    }
}

/// Estimates the integer displacement `(rows, cols)` which, applied to
/// `moving`, best aligns it with `reference`.
pub fn estimate_displacement(reference: &Plane, moving: &Plane) -> Result<(i32, i32)> {
    let surface = CrossCorrelator::new(reference).correlate(moving)?;
    Ok(surface.displacement_at(surface.peak()))
}

// mod tests.
