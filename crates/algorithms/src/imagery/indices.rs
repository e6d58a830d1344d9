//! Drought and vegetation health indices
//!
//! Per-cell index formulas over co-registered single-band rasters.

use super::band_math::{band_math_binary, per_cell, BandMathOp, DIVISION_EPSILON};
use kharif_core::raster::Raster;
use kharif_core::Result;

/// Weight of the vegetation condition in VHI (the temperature condition gets `1 - alpha`)
pub const VHI_ALPHA: f64 = 0.5;

// ---------------------------------------------------------------------------
// NMDI
// ---------------------------------------------------------------------------

/// Normalized Multi-band Drought Index (Wang & Qu, 2007)
///
/// `NMDI = (NIR - (SWIR1 - SWIR2)) / (NIR + (SWIR1 - SWIR2))`
///
/// Pixels whose denominator vanishes, or where any band is no-data,
/// are no-data.
///
/// # Arguments
/// * `nir` - Near-infrared band (~860 nm)
/// * `swir1` - Shortwave infrared band (~1640 nm)
/// * `swir2` - Shortwave infrared band (~2130 nm)
pub fn nmdi(nir: &Raster<f64>, swir1: &Raster<f64>, swir2: &Raster<f64>) -> Result<Raster<f64>> {
    let grid = nir.grid();
    grid.ensure_matches(&swir1.grid(), "NMDI")?;
    grid.ensure_matches(&swir2.grid(), "NMDI")?;

    per_cell(&grid, |row, col| {
        let n = nir.cell(row, col)?;
        let swir_diff = swir1.cell(row, col)? - swir2.cell(row, col)?;
        let denom = n + swir_diff;
        if denom.abs() < DIVISION_EPSILON {
            return None;
        }
        Some((n - swir_diff) / denom)
    })
}

// ---------------------------------------------------------------------------
// DTR
// ---------------------------------------------------------------------------

/// Diurnal temperature range: `day - night`
pub fn diurnal_range(day: &Raster<f64>, night: &Raster<f64>) -> Result<Raster<f64>> {
    band_math_binary(day, night, BandMathOp::Subtract)
}

// ---------------------------------------------------------------------------
// Vegetation health (Kogan)
// ---------------------------------------------------------------------------

/// Vegetation Condition Index
///
/// `VCI = (NDVI - NDVImin) / (NDVImax - NDVImin)`
///
/// Cells with a non-positive range are no-data.
pub fn vegetation_condition(
    ndvi: &Raster<f64>,
    min: &Raster<f64>,
    max: &Raster<f64>,
) -> Result<Raster<f64>> {
    let grid = ndvi.grid();
    grid.ensure_matches(&min.grid(), "VCI")?;
    grid.ensure_matches(&max.grid(), "VCI")?;

    per_cell(&grid, |row, col| {
        let lo = min.cell(row, col)?;
        let range = max.cell(row, col)? - lo;
        if range <= 0.0 {
            return None;
        }
        Some((ndvi.cell(row, col)? - lo) / range)
    })
}

/// Temperature Condition Index
///
/// `TCI = (LSTmax - LST) / (LSTmax - LSTmin)`
///
/// Hot pixels score low. Cells with a non-positive range are no-data.
pub fn temperature_condition(
    lst: &Raster<f64>,
    min: &Raster<f64>,
    max: &Raster<f64>,
) -> Result<Raster<f64>> {
    let grid = lst.grid();
    grid.ensure_matches(&min.grid(), "TCI")?;
    grid.ensure_matches(&max.grid(), "TCI")?;

    per_cell(&grid, |row, col| {
        let hi = max.cell(row, col)?;
        let range = hi - min.cell(row, col)?;
        if range <= 0.0 {
            return None;
        }
        Some((hi - lst.cell(row, col)?) / range)
    })
}

/// Vegetation Health Index: `alpha * VCI + (1 - alpha) * TCI` with [`VHI_ALPHA`]
pub fn vegetation_health(vci: &Raster<f64>, tci: &Raster<f64>) -> Result<Raster<f64>> {
    let grid = vci.grid();
    grid.ensure_matches(&tci.grid(), "VHI")?;

    per_cell(&grid, |row, col| {
        Some(VHI_ALPHA * vci.cell(row, col)? + (1.0 - VHI_ALPHA) * tci.cell(row, col)?)
    })
}
