//! Export of multi-band stacks onto a fixed geographic grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::io::native::{read_geotiff_pages, write_geotiff_pages};
use crate::raster::{GeoTransform, Grid, TRANSFORM_TOLERANCE};
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The grid every exported raster must sit on.
///
/// The transform is an explicit affine lattice (not a "scale"), and
/// `max_pixels` bounds `rows * cols * bands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportGrid {
    pub crs: CRS,
    /// `[x_scale, x_shear, x_translate, y_shear, y_scale, y_translate]`
    pub crs_transform: [f64; 6],
    pub max_pixels: f64,
}

impl Default for ExportGrid {
    fn default() -> Self {
        Self {
            crs: CRS::wgs84(),
            crs_transform: [0.5, 0.0, 0.0, 0.0, -0.5, 0.0],
            max_pixels: 1e13,
        }
    }
}

impl ExportGrid {
    pub fn transform(&self) -> GeoTransform {
        GeoTransform::from_affine(self.crs_transform)
    }

    /// Verify that `stack` can be written on this grid as-is.
    pub fn check(&self, stack: &RasterImage) -> Result<()> {
        let grid = stack
            .grid()
            .ok_or_else(|| Error::Export("stack has no bands".into()))?;
        self.check_grid(&grid, stack.band_count())
    }

    /// Verify that a `bands`-deep stack on `grid` could be written.
    ///
    /// Lets a run reject its input grid before any product is computed.
    pub fn check_grid(&self, grid: &Grid, bands: usize) -> Result<()> {
        if !grid.crs.is_equivalent(&self.crs) {
            return Err(Error::Export(format!(
                "stack CRS {} differs from export CRS {}",
                grid.crs, self.crs
            )));
        }

        if !grid
            .transform
            .is_aligned_to(&self.transform(), TRANSFORM_TOLERANCE)
        {
            return Err(Error::Export(format!(
                "stack transform {:?} is not on the export lattice {:?}",
                grid.transform.to_affine(),
                self.crs_transform
            )));
        }

        let pixels = (grid.len() * bands) as f64;
        if pixels > self.max_pixels {
            return Err(Error::Export(format!(
                "{} pixels exceed the ceiling of {}",
                pixels, self.max_pixels
            )));
        }

        Ok(())
    }
}

/// Sidecar describing an exported stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackManifest {
    pub bands: Vec<String>,
    pub years: Vec<Option<i32>>,
    pub crs: String,
    pub geotransform: [f64; 6],
    pub rows: usize,
    pub cols: usize,
}

/// Writes stacks as multi-page GeoTIFF plus a JSON manifest
#[derive(Debug, Clone)]
pub struct GeoTiffExporter {
    grid: ExportGrid,
}

impl GeoTiffExporter {
    pub fn new(grid: ExportGrid) -> Self {
        Self { grid }
    }

    pub fn grid(&self) -> &ExportGrid {
        &self.grid
    }

    /// Write `<dir>/<file_prefix>.tif` and `<dir>/<file_prefix>.json`.
    ///
    /// Nothing is written if the stack violates the export grid.
    /// Returns the path of the GeoTIFF.
    pub fn export(&self, stack: &RasterImage, dir: &Path, file_prefix: &str) -> Result<PathBuf> {
        self.grid.check(stack)?;

        fs::create_dir_all(dir)
            .map_err(|e| Error::Export(format!("cannot create {}: {}", dir.display(), e)))?;

        let tif_path = dir.join(format!("{}.tif", file_prefix));
        let json_path = dir.join(format!("{}.json", file_prefix));

        let pages: Vec<_> = stack.bands().map(|b| &b.raster).collect();
        write_geotiff_pages(&pages, &tif_path)
            .map_err(|e| Error::Export(format!("{}: {}", tif_path.display(), e)))?;

        let manifest = manifest_for(stack)?;
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(&json_path, json)
            .map_err(|e| Error::Export(format!("{}: {}", json_path.display(), e)))?;

        Ok(tif_path)
    }
}

/// Read an exported stack back, band names taken from its `.json` manifest.
///
/// The image timestamp is January 1st of the first band's year.
pub fn read_stack(path: &Path) -> Result<RasterImage> {
    let json_path = path.with_extension("json");
    let json = fs::read_to_string(&json_path).map_err(|e| {
        Error::SchemaMismatch(format!("no band manifest {}: {}", json_path.display(), e))
    })?;
    let manifest: StackManifest = serde_json::from_str(&json)?;

    let pages = read_geotiff_pages(path)?;
    if pages.len() != manifest.bands.len() {
        return Err(Error::SchemaMismatch(format!(
            "{} has {} pages but its manifest names {} bands",
            path.display(),
            pages.len(),
            manifest.bands.len()
        )));
    }

    let timestamp = manifest
        .years
        .iter()
        .flatten()
        .next()
        .and_then(|&year| Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single())
        .unwrap_or_default();
    manifest
        .bands
        .into_iter()
        .zip(pages)
        .try_fold(RasterImage::new(timestamp), |image, (name, raster)| {
            image.with_band(name, raster)
        })
}

/// Band years are parsed back from the `<prefix>_<year>` names
fn manifest_for(stack: &RasterImage) -> Result<StackManifest> {
    let grid = stack
        .grid()
        .ok_or_else(|| Error::Export("stack has no bands".into()))?;
    let bands: Vec<String> = stack.band_names().iter().map(|s| s.to_string()).collect();
    let years = bands
        .iter()
        .map(|name| name.rsplit('_').next().and_then(|y| y.parse().ok()))
        .collect();

    Ok(StackManifest {
        bands,
        years,
        crs: grid.crs.identifier(),
        geotransform: grid.transform.to_gdal(),
        rows: grid.rows,
        cols: grid.cols,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Raster;
    use chrono::{TimeZone, Utc};

    fn stack_on(transform: GeoTransform, crs: CRS) -> RasterImage {
        let grid = Grid::new(2, 3, transform, crs);
        let t = Utc.with_ymd_and_hms(2000, 6, 1, 0, 0, 0).unwrap();
        let mut a = Raster::filled(2, 3, 0.1).on_grid(&grid);
        a.invalidate(0, 2).unwrap();
        RasterImage::from_band("EVI_2000", a, t)
            .with_band("EVI_2001", Raster::filled(2, 3, 0.2).on_grid(&grid))
            .unwrap()
    }

    #[test]
    fn test_check_accepts_lattice_aligned_stack() {
        let stack = stack_on(GeoTransform::new(68.0, 37.0, 0.5, -0.5), CRS::wgs84());
        assert!(ExportGrid::default().check(&stack).is_ok());
    }

    #[test]
    fn test_check_rejects_off_contract_grids() {
        let grid = ExportGrid::default();

        let shifted = stack_on(GeoTransform::new(68.1, 37.0, 0.5, -0.5), CRS::wgs84());
        assert!(matches!(grid.check(&shifted), Err(Error::Export(_))));

        let finer = stack_on(GeoTransform::new(68.0, 37.0, 0.25, -0.25), CRS::wgs84());
        assert!(matches!(grid.check(&finer), Err(Error::Export(_))));

        let projected = stack_on(GeoTransform::new(68.0, 37.0, 0.5, -0.5), CRS::from_epsg(32644));
        assert!(matches!(grid.check(&projected), Err(Error::Export(_))));

        let tight = ExportGrid {
            max_pixels: 11.0,
            ..ExportGrid::default()
        };
        let ok = stack_on(GeoTransform::new(68.0, 37.0, 0.5, -0.5), CRS::wgs84());
        assert!(matches!(tight.check(&ok), Err(Error::Export(_))));
    }

    #[test]
    fn test_check_grid_before_any_stack_exists() {
        let grid = ExportGrid::default();
        let modis = Grid::new(4, 4, GeoTransform::new(76.0, 22.0, 0.0045, -0.0045), CRS::wgs84());
        assert!(matches!(grid.check_grid(&modis, 21), Err(Error::Export(_))));

        let coarse = Grid::new(4, 4, GeoTransform::new(76.0, 22.0, 0.5, -0.5), CRS::wgs84());
        assert!(grid.check_grid(&coarse, 21).is_ok());
        let tight = ExportGrid {
            max_pixels: 16.0 * 21.0 - 1.0,
            ..ExportGrid::default()
        };
        assert!(matches!(tight.check_grid(&coarse, 21), Err(Error::Export(_))));
    }

    #[test]
    fn test_export_roundtrip() {
        let stack = stack_on(GeoTransform::new(68.0, 37.0, 0.5, -0.5), CRS::wgs84());
        let dir = tempfile::tempdir().unwrap();

        let exporter = GeoTiffExporter::new(ExportGrid::default());
        let path = exporter.export(&stack, dir.path(), "EVI_kharif_2000to2001").unwrap();

        let pages = read_geotiff_pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].cell(0, 2), None);
        assert!((pages[1].cell(1, 1).unwrap() - 0.2).abs() < 1e-6);

        let json = std::fs::read_to_string(dir.path().join("EVI_kharif_2000to2001.json")).unwrap();
        let manifest: StackManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(manifest.bands, vec!["EVI_2000", "EVI_2001"]);
        assert_eq!(manifest.years, vec![Some(2000), Some(2001)]);
        assert_eq!(manifest.crs, "EPSG:4326");

        let back = read_stack(&path).unwrap();
        assert_eq!(back.band_names(), vec!["EVI_2000", "EVI_2001"]);
        assert_eq!(back.year(), 2000);
        assert_eq!(back.band("EVI_2000").unwrap().cell(0, 2), None);
    }

    #[test]
    fn test_read_stack_needs_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.tif");
        let raster = Raster::filled(2, 2, 1.0);
        crate::io::write_geotiff(&raster, &path).unwrap();
        assert!(matches!(read_stack(&path), Err(Error::SchemaMismatch(_))));
    }
}
