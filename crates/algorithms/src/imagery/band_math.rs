//! Band math operations
//!
//! Cell-wise arithmetic on one or two co-registered rasters. A cell is
//! computed only where every input is valid; everything else stays
//! no-data.

use crate::maybe_rayon::*;
use kharif_core::raster::{Grid, Raster};
use kharif_core::Result;

/// Denominators smaller than this in magnitude give no-data
pub const DIVISION_EPSILON: f64 = 1e-10;

/// Binary operations for band math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandMathOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BandMathOp {
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        match self {
            BandMathOp::Add => Some(a + b),
            BandMathOp::Subtract => Some(a - b),
            BandMathOp::Multiply => Some(a * b),
            BandMathOp::Divide => {
                if b.abs() < DIVISION_EPSILON {
                    None
                } else {
                    Some(a / b)
                }
            }
        }
    }
}

/// Evaluate `f(row, col)` for every cell of `grid`, one row per task.
pub(crate) fn per_cell<F>(grid: &Grid, f: F) -> Result<Raster<f64>>
where
    F: Fn(usize, usize) -> Option<f64> + Sync + Send,
{
    let (rows, cols) = grid.shape();

    let cells: Vec<Option<f64>> = (0..rows)
        .into_par_iter()
        .flat_map(|row| (0..cols).map(|col| f(row, col)).collect::<Vec<_>>())
        .collect();

    Raster::from_options(grid, cells)
}

/// Apply a unary function to every valid cell in a raster.
///
/// Invalid cells stay invalid; a `None` from `f` invalidates the cell.
///
/// # Example
/// ```ignore
/// let scaled = band_math(&raw, |v| Some(v * 0.0001))?;
/// ```
pub fn band_math<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> Option<f64> + Sync + Send,
{
    per_cell(&raster.grid(), |row, col| raster.cell(row, col).and_then(&f))
}

/// Apply a binary operation between two rasters element-wise.
///
/// Both rasters must be co-registered. No-data in either input
/// produces no-data in the output, and so does division by (near) zero.
pub fn band_math_binary(a: &Raster<f64>, b: &Raster<f64>, op: BandMathOp) -> Result<Raster<f64>> {
    let grid = a.grid();
    grid.ensure_matches(&b.grid(), "band math")?;

    per_cell(&grid, |row, col| {
        let va = a.cell(row, col)?;
        let vb = b.cell(row, col)?;
        op.apply(va, vb)
    })
}
