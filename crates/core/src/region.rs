//! Region of interest used to clip composites

use crate::error::{Error, Result};
use crate::raster::{Grid, Raster};
use geo::Contains;
use geo_types::{LineString, Point, Polygon};
use ndarray::Array2;

/// A polygon boundary in the CRS of the grids it clips.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    polygon: Polygon<f64>,
}

impl Region {
    pub fn new(polygon: Polygon<f64>) -> Self {
        Self { polygon }
    }

    /// Build a region from an exterior ring of (x, y) vertices.
    /// The ring is closed automatically.
    pub fn from_ring(vertices: &[(f64, f64)]) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(Error::invalid_parameter(
                "region",
                format!("{} vertices", vertices.len()),
                "a polygon needs at least 3 vertices",
            ));
        }
        if vertices.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::invalid_parameter(
                "region",
                "non-finite vertex",
                "vertex coordinates must be finite",
            ));
        }
        let ring = LineString::from(vertices.to_vec());
        Ok(Self::new(Polygon::new(ring, Vec::new())))
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Whether the point lies strictly inside the polygon
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.polygon.contains(&Point::new(x, y))
    }

    /// Per-cell mask of `grid`, `true` where the cell centre is inside
    pub fn mask_for(&self, grid: &Grid) -> Array2<bool> {
        Array2::from_shape_fn(grid.shape(), |(row, col)| {
            let (x, y) = grid.transform.pixel_to_geo(col, row);
            self.contains(x, y)
        })
    }

    /// Copy of `raster` with every cell outside the region set to no-data
    pub fn clip(&self, raster: &Raster<f64>) -> Result<Raster<f64>> {
        raster.masked(&self.mask_for(&raster.grid()))
    }
}
