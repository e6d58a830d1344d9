//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Grid, RasterElement};
use ndarray::{Array2, ArrayView2, Zip};

/// A georeferenced 2D raster grid with a per-cell validity mask.
///
/// `Raster<T>` stores values of type `T` in a 2D grid next to a boolean
/// mask of the same shape. A cell whose mask bit is `false` is no-data:
/// its stored value is meaningless and is never read by the arithmetic
/// helpers. There is no sentinel no-data value.
///
/// # Example
///
/// ```ignore
/// use kharif_core::Raster;
///
/// let mut raster: Raster<f64> = Raster::new(100, 100);
/// raster.set(10, 20, 42.0)?;
/// raster.invalidate(10, 21)?;
///
/// assert_eq!(raster.get(10, 20)?, Some(42.0));
/// assert_eq!(raster.get(10, 21)?, None);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// `true` where the cell holds a value
    valid: Array2<bool>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: CRS,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros, all cells valid
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value, all cells valid
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster on `grid` in which every cell is no-data
    pub fn empty(grid: &Grid) -> Self {
        Self {
            data: Array2::zeros(grid.shape()),
            valid: Array2::from_elem(grid.shape(), false),
            transform: grid.transform,
            crs: grid.crs.clone(),
        }
    }

    /// Create a raster from existing row-major data, all cells valid
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray, all cells valid
    pub fn from_array(data: Array2<T>) -> Self {
        let valid = Array2::from_elem(data.dim(), true);
        Self {
            data,
            valid,
            transform: GeoTransform::default(),
            crs: CRS::default(),
        }
    }

    /// Create a raster from a value array and a validity mask of the same shape
    pub fn from_parts(data: Array2<T>, valid: Array2<bool>) -> Result<Self> {
        if data.dim() != valid.dim() {
            let (er, ec) = data.dim();
            let (ar, ac) = valid.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        Ok(Self {
            data,
            valid,
            transform: GeoTransform::default(),
            crs: CRS::default(),
        })
    }

    /// Build a raster on `grid` from optional per-cell values in row-major order
    pub fn from_options(grid: &Grid, cells: Vec<Option<T>>) -> Result<Self> {
        if cells.len() != grid.len() {
            return Err(Error::InvalidDimensions {
                width: grid.cols,
                height: grid.rows,
            });
        }
        let mut data = Vec::with_capacity(cells.len());
        let mut valid = Vec::with_capacity(cells.len());
        for cell in cells {
            data.push(cell.unwrap_or_else(T::zero));
            valid.push(cell.is_some());
        }
        let shape = grid.shape();
        let data = Array2::from_shape_vec(shape, data).map_err(|e| Error::Other(e.to_string()))?;
        let valid =
            Array2::from_shape_vec(shape, valid).map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_parts(data, valid)?.on_grid(grid))
    }

    /// Attach the transform and CRS of `grid` (shape is not changed)
    pub fn on_grid(mut self, grid: &Grid) -> Self {
        self.transform = grid.transform;
        self.crs = grid.crs.clone();
        self
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Value at (row, col), `None` for no-data
    pub fn get(&self, row: usize, col: usize) -> Result<Option<T>> {
        self.check_bounds(row, col)?;
        Ok(self.cell(row, col))
    }

    /// Value at (row, col), `None` for no-data.
    ///
    /// # Panics
    /// Panics if the index is out of bounds.
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> Option<T> {
        if self.valid[(row, col)] {
            Some(self.data[(row, col)])
        } else {
            None
        }
    }

    /// Set value at (row, col) and mark the cell valid
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[(row, col)] = value;
        self.valid[(row, col)] = true;
        Ok(())
    }

    /// Mark the cell at (row, col) as no-data
    pub fn invalidate(&mut self, row: usize, col: usize) -> Result<()> {
        self.check_bounds(row, col)?;
        self.data[(row, col)] = T::zero();
        self.valid[(row, col)] = false;
        Ok(())
    }

    fn check_bounds(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(())
    }

    /// Whether the cell at (row, col) holds a value
    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        self.valid.get((row, col)).copied().unwrap_or(false)
    }

    /// Get a view of the underlying values (including no-data cells)
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying values
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a reference to the validity mask
    pub fn valid_mask(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Consume the raster and return values and validity mask
    pub fn into_parts(self) -> (Array2<T>, Array2<bool>) {
        (self.data, self.valid)
    }

    /// Number of valid cells
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    /// Copy of this raster with every cell outside `mask` turned into no-data.
    ///
    /// Cells already invalid stay invalid; the grid shape is preserved.
    pub fn masked(&self, mask: &Array2<bool>) -> Result<Self> {
        if mask.dim() != self.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = mask.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
        let mut valid = self.valid.clone();
        Zip::from(&mut valid).and(mask).for_each(|v, &m| *v = *v && m);
        Ok(Self {
            data: self.data.clone(),
            valid,
            transform: self.transform,
            crs: self.crs.clone(),
        })
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: CRS) {
        self.crs = crs;
    }

    /// The grid (shape, transform, CRS) this raster lives on
    pub fn grid(&self) -> Grid {
        Grid::new(self.rows(), self.cols(), self.transform, self.crs.clone())
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for (&value, &is_valid) in self.data.iter().zip(self.valid.iter()) {
            if !is_valid {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f64> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
        assert_eq!(raster.valid_count(), 100 * 200);
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 42.0).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), Some(42.0));

        raster.invalidate(5, 5).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), None);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_empty_raster_is_all_nodata() {
        let grid = Grid::new(3, 4, GeoTransform::default(), CRS::wgs84());
        let raster: Raster<f64> = Raster::empty(&grid);
        assert_eq!(raster.shape(), (3, 4));
        assert_eq!(raster.valid_count(), 0);
        assert!(raster.grid().is_aligned_with(&grid));
    }

    #[test]
    fn test_masked_keeps_shape() {
        let raster: Raster<f64> = Raster::filled(2, 2, 1.0);
        let mask = Array2::from_shape_vec((2, 2), vec![true, false, false, true]).unwrap();
        let out = raster.masked(&mask).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.cell(0, 0), Some(1.0));
        assert_eq!(out.cell(0, 1), None);
        assert_eq!(out.cell(1, 1), Some(1.0));
    }

    #[test]
    fn test_raster_statistics() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.invalidate(9, 9).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(0.0));
        assert_eq!(stats.max, Some(98.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }
}
