//! Raster data structures and operations

mod element;
mod geotransform;
mod georef;
mod grid;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use georef::{Grid, TRANSFORM_TOLERANCE};
pub use grid::{Raster, RasterStatistics};
