use nalgebra::{DMatrix, DVector};
use polars::prelude::*;

use crate::error::PrismError;
use crate::instrument::geometry::{DETECTOR_PIXELS, detector_histogram, format_energy, round_to};

/// Probability that a neutron detected in a pixel (row) came from a
/// calibration energy (column). Every row sums to 1 or is entirely zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatrix {
    energies: Vec<f64>,
    positions: Vec<f64>,
    weights: DMatrix<f64>,
}

impl CalibrationMatrix {
    /// Normalizes the per-energy fit curves (pixels x energies)
    pub fn from_fits(energies: Vec<f64>, fits: DMatrix<f64>) -> Result<Self, PrismError> {
        Self::check_shape(&energies, &fits)?;
        Self::from_weights(energies, normalize(&fits))
    }

    /// Wraps weights that are already normalized
    pub fn from_weights(energies: Vec<f64>, weights: DMatrix<f64>) -> Result<Self, PrismError> {
        Self::check_shape(&energies, &weights)?;
        Ok(CalibrationMatrix {
            energies,
            positions: detector_histogram().get_bin_centers(),
            weights,
        })
    }

    fn check_shape(energies: &[f64], weights: &DMatrix<f64>) -> Result<(), PrismError> {
        if weights.nrows() != DETECTOR_PIXELS || weights.ncols() != energies.len() {
            return Err(PrismError::CalibrationShape {
                rows: weights.nrows(),
                columns: weights.ncols(),
            });
        }
        Ok(())
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Pixel centers in meters
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    pub fn weights(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Distributes a detector histogram over the calibration energies
    pub fn reproject(&self, counts: &[f64]) -> Result<Vec<f64>, PrismError> {
        if counts.len() != self.weights.nrows() {
            return Err(PrismError::HistogramLength {
                expected: self.weights.nrows(),
                found: counts.len(),
            });
        }

        let intensities = self.weights.tr_mul(&DVector::from_column_slice(counts));
        Ok(intensities.iter().copied().collect())
    }

    /// (energy, probability) pairs of one pixel
    pub fn pixel_distribution(&self, pixel: usize) -> Option<Vec<(f64, f64)>> {
        if pixel >= self.weights.nrows() {
            return None;
        }

        Some(
            self.energies
                .iter()
                .zip(self.weights.row(pixel).iter())
                .map(|(&energy, &probability)| (energy, probability))
                .collect(),
        )
    }

    /// One `Position` column plus one column per calibration energy
    pub fn to_dataframe(&self) -> Result<DataFrame, PrismError> {
        let mut df = df!("Position" => self.positions.clone())?;

        for (energy, weights) in self.energies.iter().zip(self.weights.column_iter()) {
            let values: Vec<f64> = weights.iter().copied().collect();
            df.with_column(Series::new(format_energy(*energy).into(), values).into())?;
        }

        Ok(df)
    }
}

/// Two passes over the raw fit curves. Energy columns are first scaled to the
/// largest column total, which corrects the relative efficiency of the
/// calibration runs. Each pixel row is then divided by its sum. Empty columns
/// and empty rows stay zero. Cells are rounded to 5 decimals.
pub fn normalize(fits: &DMatrix<f64>) -> DMatrix<f64> {
    let mut weights = fits.clone();

    let totals: Vec<f64> = weights.column_iter().map(|column| column.sum()).collect();
    let max_total = totals.iter().copied().fold(0.0, f64::max);

    for (j, &total) in totals.iter().enumerate() {
        if total > 0.0 {
            let scale = max_total / total;
            weights.column_mut(j).iter_mut().for_each(|cell| *cell *= scale);
        }
    }

    for mut row in weights.row_iter_mut() {
        let sum = row.sum();
        let sum = if sum == 0.0 { 1.0 } else { sum };
        row.iter_mut().for_each(|cell| *cell = round_to(*cell / sum, 5));
    }

    weights
}
