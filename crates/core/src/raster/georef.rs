//! Spatial reference of a raster: shape, transform and CRS together

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// Transform coefficients closer than this are treated as equal
pub const TRANSFORM_TOLERANCE: f64 = 1e-9;

/// The grid a raster lives on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: CRS,
}

impl Grid {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform, crs: CRS) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs,
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two grids address the same cells
    pub fn is_aligned_with(&self, other: &Grid) -> bool {
        self.mismatch(other).is_none()
    }

    /// Fail with [`Error::GridMismatch`] unless `other` is co-registered with `self`
    pub fn ensure_matches(&self, other: &Grid, context: &str) -> Result<()> {
        match self.mismatch(other) {
            None => Ok(()),
            Some(detail) => Err(Error::GridMismatch {
                context: context.to_string(),
                detail,
            }),
        }
    }

    fn mismatch(&self, other: &Grid) -> Option<String> {
        if self.shape() != other.shape() {
            return Some(format!(
                "shape {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            ));
        }
        if !self.transform.approx_eq(&other.transform, TRANSFORM_TOLERANCE) {
            return Some(format!(
                "transform {:?} vs {:?}",
                self.transform.to_gdal(),
                other.transform.to_gdal()
            ));
        }
        if !self.crs.is_equivalent(&other.crs) {
            return Some(format!("crs {} vs {}", self.crs, other.crs));
        }
        None
    }
}
