//! Reading and writing rasters
//!
//! - **native**: GeoTIFF pages through the `tiff` crate
//! - **export**: the export grid contract, the stack exporter and its reader

mod export;
mod native;

pub use export::{read_stack, ExportGrid, GeoTiffExporter, StackManifest};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, read_geotiff_pages, write_geotiff,
    write_geotiff_pages, write_geotiff_to_buffer,
};
