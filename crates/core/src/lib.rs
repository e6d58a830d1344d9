//! # Kharif Core
//!
//! Core types and I/O for kharif seasonal composites.
//!
//! This crate provides:
//! - `Raster<T>`: raster grid with an explicit validity mask
//! - `GeoTransform`, `Grid`, `CRS`: georeferencing
//! - `RasterImage` / `RasterCollection`: timestamped multi-band images
//! - `Region`: polygon clipping
//! - GeoTIFF I/O and the export grid contract

pub mod collection;
pub mod crs;
pub mod error;
pub mod image;
pub mod io;
pub mod raster;
pub mod region;

pub use collection::RasterCollection;
pub use crs::CRS;
pub use error::{Error, Result};
pub use image::{NamedBand, PropertyValue, RasterImage, PROP_COMPOSITE_START, PROP_YEAR};
pub use raster::{GeoTransform, Grid, Raster, RasterElement};
pub use region::Region;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collection::RasterCollection;
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::image::{PropertyValue, RasterImage};
    pub use crate::raster::{GeoTransform, Grid, Raster, RasterElement};
    pub use crate::region::Region;
}
