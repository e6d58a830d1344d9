//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up grids the rotations are 0 and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from an affine row-major array
    /// `[x_scale, x_shear, x_translate, y_shear, y_scale, y_translate]`,
    /// the `crsTransform` convention used by export requests.
    pub fn from_affine(coeffs: [f64; 6]) -> Self {
        Self {
            pixel_width: coeffs[0],
            row_rotation: coeffs[1],
            origin_x: coeffs[2],
            col_rotation: coeffs[3],
            pixel_height: coeffs[4],
            origin_y: coeffs[5],
        }
    }

    /// Convert to the affine row-major array (see [`GeoTransform::from_affine`])
    pub fn to_affine(&self) -> [f64; 6] {
        [
            self.pixel_width,
            self.row_rotation,
            self.origin_x,
            self.col_rotation,
            self.pixel_height,
            self.origin_y,
        ]
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Geographic coordinates of the pixel center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Geographic coordinates of the pixel's top-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let x = self.origin_x + col * self.pixel_width + row * self.row_rotation;
        let y = self.origin_y + col * self.col_rotation + row * self.pixel_height;
        (x, y)
    }

    /// Convert geographic coordinates to fractional pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;

        if det.abs() < 1e-10 {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;

        (col, row)
    }

    /// Coefficient-wise comparison with an absolute tolerance
    pub fn approx_eq(&self, other: &GeoTransform, tolerance: f64) -> bool {
        self.to_gdal()
            .iter()
            .zip(other.to_gdal().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Whether this transform has the same cell size and rotation as
    /// `lattice` and its origin sits on one of the lattice's cell corners.
    pub fn is_aligned_to(&self, lattice: &GeoTransform, tolerance: f64) -> bool {
        let same_cells = (self.pixel_width - lattice.pixel_width).abs() <= tolerance
            && (self.pixel_height - lattice.pixel_height).abs() <= tolerance
            && (self.row_rotation - lattice.row_rotation).abs() <= tolerance
            && (self.col_rotation - lattice.col_rotation).abs() <= tolerance;
        if !same_cells {
            return false;
        }

        let (col, row) = lattice.geo_to_pixel(self.origin_x, self.origin_y);
        (col - col.round()).abs() <= 1e-6 && (row - row.round()).abs() <= 1e-6
    }

    /// Calculate the bounding box (min_x, min_y, max_x, max_y) for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    /// The 0.5 degree global lattice anchored at (0, 0)
    fn default() -> Self {
        Self::from_affine([0.5, 0.0, 0.0, 0.0, -0.5, 0.0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GeoTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_affine_order() {
        let gt = GeoTransform::from_affine([0.5, 0.0, 68.0, 0.0, -0.5, 37.0]);
        assert_eq!(gt.origin_x, 68.0);
        assert_eq!(gt.origin_y, 37.0);
        assert_eq!(gt.pixel_width, 0.5);
        assert_eq!(gt.pixel_height, -0.5);
        assert_eq!(gt.to_affine(), [0.5, 0.0, 68.0, 0.0, -0.5, 37.0]);
        assert_eq!(gt.to_gdal(), [68.0, 0.5, 0.0, 37.0, 0.0, -0.5]);
    }

    #[test]
    fn test_alignment_to_lattice() {
        let lattice = GeoTransform::default();
        assert!(GeoTransform::new(68.0, 37.5, 0.5, -0.5).is_aligned_to(&lattice, 1e-9));
        assert!(!GeoTransform::new(68.25, 37.5, 0.5, -0.5).is_aligned_to(&lattice, 1e-9));
        assert!(!GeoTransform::new(68.0, 37.5, 0.25, -0.25).is_aligned_to(&lattice, 1e-9));
    }

    #[test]
    fn test_bounds() {
        let gt = GeoTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }
}
