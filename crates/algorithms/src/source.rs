//! Where raw collections come from
//!
//! [`DirectorySource`] reads a dated directory tree of single-band
//! GeoTIFFs:
//!
//! ```text
//! <root>/MOD13A1/2004-07-11/NDVI.tif
//! <root>/MOD13A1/2004-07-11/EVI.tif
//! <root>/MOD13A1/2004-07-11/SummaryQA.tif
//! <root>/MOD11A2/2004-07-11/LST_Day_1km.tif
//! ...
//! ```
//!
//! [`MemorySource`] serves prebuilt collections.

use crate::maybe_rayon::*;
use crate::products::SourceKind;
use crate::temporal::YearRange;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use kharif_core::io::{read_geotiff, write_geotiff};
use kharif_core::{Error, RasterCollection, RasterImage, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DATE_DIR_FORMAT: &str = "%Y-%m-%d";

/// Supplies the raw collection for a source product
pub trait CollectionSource: Send + Sync {
    fn load(&self, kind: SourceKind) -> Result<RasterCollection>;
}

/// Reads `<root>/<SOURCE>/<YYYY-MM-DD>/<band>.tif`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    years: YearRange,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, years: YearRange) -> Self {
        Self {
            root: root.into(),
            years,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dated_dirs(&self, kind: SourceKind) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let dir = self.root.join(kind.name());
        let entries = fs::read_dir(&dir)
            .map_err(|e| Error::Acquisition(format!("{}: {}", dir.display(), e)))?;

        let mut dated = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Acquisition(format!("{}: {}", dir.display(), e)))?;
            let path = entry.path();
            let date = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| NaiveDate::parse_from_str(n, DATE_DIR_FORMAT).ok());
            match date {
                Some(date) if path.is_dir() => {
                    if self.years.contains(date.year()) {
                        dated.push((date, path));
                    }
                }
                _ => debug!(path = %path.display(), "skipping entry without a date name"),
            }
        }
        dated.sort_by_key(|(date, _)| *date);
        Ok(dated)
    }

    fn read_image(kind: SourceKind, date: NaiveDate, dir: &Path) -> Result<RasterImage> {
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| Error::Acquisition(format!("invalid date {}", date)))?;

        let mut image = RasterImage::new(timestamp);
        for band in kind.raw_bands() {
            let path = dir.join(format!("{}.tif", band));
            let raster = read_geotiff(&path)
                .map_err(|e| Error::Acquisition(format!("{}: {}", path.display(), e)))?;
            image = image.with_band(band, raster)?;
        }
        Ok(image)
    }
}

impl CollectionSource for DirectorySource {
    fn load(&self, kind: SourceKind) -> Result<RasterCollection> {
        let dated = self.dated_dirs(kind)?;

        let images: Vec<RasterImage> = dated
            .into_par_iter()
            .map(|(date, dir)| Self::read_image(kind, date, &dir))
            .collect::<Result<_>>()?;

        info!(source = kind.name(), images = images.len(), "loaded collection");
        Ok(RasterCollection::new(kind.name(), images))
    }
}

/// Write `collection` in the [`DirectorySource`] layout under `root`,
/// one directory per acquisition date named after the collection.
pub fn write_collection(root: &Path, collection: &RasterCollection) -> Result<()> {
    for image in collection.iter() {
        let dir = root
            .join(collection.name())
            .join(image.timestamp().format(DATE_DIR_FORMAT).to_string());
        fs::create_dir_all(&dir)?;
        for band in image.bands() {
            write_geotiff(&band.raster, dir.join(format!("{}.tif", band.name)))?;
        }
    }
    Ok(())
}

/// Serves collections held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: BTreeMap<SourceKind, RasterCollection>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: SourceKind, collection: RasterCollection) -> Self {
        self.insert(kind, collection);
        self
    }

    pub fn insert(&mut self, kind: SourceKind, collection: RasterCollection) {
        self.collections.insert(kind, collection.renamed(kind.name()));
    }
}

impl CollectionSource for MemorySource {
    fn load(&self, kind: SourceKind) -> Result<RasterCollection> {
        self.collections
            .get(&kind)
            .cloned()
            .ok_or_else(|| Error::Acquisition(format!("no {} collection available", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kharif_core::{GeoTransform, Grid, Raster, CRS};

    fn lst_image(y: i32, m: u32, d: u32, grid: &Grid) -> RasterImage {
        let t = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
        RasterImage::from_band("LST_Day_1km", Raster::filled(2, 2, 14900.0).on_grid(grid), t)
            .with_band("LST_Night_1km", Raster::filled(2, 2, 14100.0).on_grid(grid))
            .unwrap()
            .with_band("QC_Day", Raster::filled(2, 2, 0.0).on_grid(grid))
            .unwrap()
    }

    #[test]
    fn test_directory_roundtrip() {
        let grid = Grid::new(2, 2, GeoTransform::new(76.0, 22.0, 0.5, -0.5), CRS::wgs84());
        let collection = RasterCollection::new(
            "MOD11A1",
            vec![
                lst_image(2003, 7, 2, &grid),
                lst_image(2002, 6, 30, &grid),
                lst_image(1999, 8, 1, &grid),
            ],
        );
        let dir = tempfile::tempdir().unwrap();
        write_collection(dir.path(), &collection).unwrap();
        fs::write(dir.path().join("MOD11A1").join("README"), "notes").unwrap();

        let source = DirectorySource::new(dir.path(), YearRange::new(2000, 2010).unwrap());
        let loaded = source.load(SourceKind::Mod11a1).unwrap();

        assert_eq!(loaded.name(), "MOD11A1");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.images()[0].timestamp(), Utc.with_ymd_and_hms(2002, 6, 30, 0, 0, 0).unwrap());
        let first = &loaded.images()[0];
        assert_eq!(first.band_names(), SourceKind::Mod11a1.raw_bands());
        assert!(first.grid().unwrap().is_aligned_with(&grid));
        assert_eq!(first.band("LST_Night_1km").unwrap().cell(1, 1), Some(14100.0));
    }

    #[test]
    fn test_missing_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path(), YearRange::default());
        assert!(matches!(
            source.load(SourceKind::Mod09a1),
            Err(Error::Acquisition(_))
        ));
    }

    #[test]
    fn test_missing_band_file() {
        let dir = tempfile::tempdir().unwrap();
        let day = dir.path().join("MOD11A2").join("2005-07-04");
        fs::create_dir_all(&day).unwrap();
        write_geotiff(&Raster::filled(2, 2, 15000.0), day.join("LST_Day_1km.tif")).unwrap();

        let source = DirectorySource::new(dir.path(), YearRange::default());
        assert!(matches!(
            source.load(SourceKind::Mod11a2),
            Err(Error::Acquisition(_))
        ));
    }

    #[test]
    fn test_memory_source() {
        let grid = Grid::new(2, 2, GeoTransform::default(), CRS::wgs84());
        let source = MemorySource::new().with(
            SourceKind::Mod11a2,
            RasterCollection::new("anything", vec![lst_image(2001, 7, 4, &grid)]),
        );

        let loaded = source.load(SourceKind::Mod11a2).unwrap();
        assert_eq!(loaded.name(), "MOD11A2");
        assert_eq!(loaded.len(), 1);
        assert!(source.load(SourceKind::Mod13a1).is_err());
    }
}
