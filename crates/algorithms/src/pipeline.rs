//! End-to-end kharif run: load, mask, scale, derive, composite, stack
//!
//! ```text
//! MOD13A1  ──mask/scale──┬─► NDVI, EVI ─────────────┐
//!                        └─► VHI (joined w/ MOD11A2) ─┤
//! MOD11A2  ──mask/scale──────┘                        │
//! MOD11A1  ──mask/scale──► DTR ───────────────────────┼─► yearly mean ─► stack
//! MCD15A3H ──mask/scale──► LAI, FPAR ─────────────────┤
//! MOD09A1  ──mask/scale──► NMDI ──────────────────────┘
//! ```

use crate::maybe_rayon::*;
use crate::products::{
    diurnal_range_image, nmdi_image, stack_composites, Product, SourceKind, VhiDeriver,
};
use crate::source::CollectionSource;
use crate::temporal::{Season, YearRange, YearlyCompositor, DEFAULT_JOIN_TOLERANCE_DAYS};
use chrono::Duration;
use kharif_core::io::{ExportGrid, GeoTiffExporter};
use kharif_core::raster::Grid;
use kharif_core::{Error, RasterCollection, RasterImage, Region, Result};
use kharif_parallel::{ProcessingMode, TiledProcessor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// Inclusive `[start_month, end_month]`
    pub season: [u32; 2],
    pub join_tolerance_days: i64,
    /// Exterior ring of the region of interest, `(x, y)` in the grid CRS
    pub region: Option<Vec<(f64, f64)>>,
    pub export: ExportGrid,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_year: 2000,
            end_year: 2020,
            season: [6, 11],
            join_tolerance_days: DEFAULT_JOIN_TOLERANCE_DAYS,
            region: None,
            export: ExportGrid::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn years(&self) -> Result<YearRange> {
        YearRange::new(self.start_year, self.end_year)
    }

    pub fn season(&self) -> Result<Season> {
        Season::new(self.season[0], self.season[1])
    }

    pub fn join_tolerance(&self) -> Result<Duration> {
        if self.join_tolerance_days < 0 {
            return Err(Error::invalid_parameter(
                "join_tolerance_days",
                self.join_tolerance_days,
                "must not be negative",
            ));
        }
        Ok(Duration::days(self.join_tolerance_days))
    }

    pub fn region(&self) -> Result<Option<Region>> {
        self.region.as_deref().map(Region::from_ring).transpose()
    }

    pub fn validate(&self) -> Result<()> {
        self.years()?;
        self.season()?;
        self.join_tolerance()?;
        self.region()?;
        Ok(())
    }

    /// `<PRODUCT>_kharif_<start>to<end>`
    pub fn file_prefix(&self, product: Product) -> String {
        format!(
            "{}_kharif_{}to{}",
            product.prefix(),
            self.start_year,
            self.end_year
        )
    }
}

/// The stacks of one run, one per [`Product`], in [`Product::ALL`] order
#[derive(Debug, Clone)]
pub struct ProductSet {
    stacks: Vec<(Product, RasterImage)>,
}

impl ProductSet {
    pub fn get(&self, product: Product) -> Option<&RasterImage> {
        self.stacks
            .iter()
            .find(|(p, _)| *p == product)
            .map(|(_, stack)| stack)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Product, &RasterImage)> {
        self.stacks.iter().map(|(p, stack)| (*p, stack))
    }

    pub fn len(&self) -> usize {
        self.stacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }
}

/// Prepared (masked and scaled) collections of a run
struct Prepared {
    collections: BTreeMap<SourceKind, RasterCollection>,
}

impl Prepared {
    fn get(&self, kind: SourceKind) -> Result<&RasterCollection> {
        self.collections
            .get(&kind)
            .ok_or_else(|| Error::Acquisition(format!("{} was not loaded", kind)))
    }

    /// Grid of the first non-empty collection; every other non-empty
    /// collection must match it.
    fn run_grid(&self) -> Result<Grid> {
        let mut grids = SourceKind::ALL
            .iter()
            .filter_map(|kind| Some((*kind, self.collections.get(kind)?.grid()?)));

        let (first_kind, grid) = grids
            .next()
            .ok_or_else(|| Error::Acquisition("every source collection is empty".into()))?;
        for (kind, other) in grids {
            grid.ensure_matches(&other, &format!("{} vs {}", first_kind, kind))?;
        }
        Ok(grid)
    }
}

/// Runs the full batch over five source collections
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    mode: ProcessingMode,
    processor: TiledProcessor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            mode: ProcessingMode::default(),
            processor: TiledProcessor::default(),
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.processor = TiledProcessor::new(tile_size);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compute all seven products. Any error aborts the whole run.
    pub fn run(&self, source: &dyn CollectionSource) -> Result<ProductSet> {
        self.config.validate()?;
        self.mode.install(|| self.run_all(source))?
    }

    fn run_all(&self, source: &dyn CollectionSource) -> Result<ProductSet> {
        let years = self.config.years()?;
        let season = self.config.season()?;

        info!(
            start = years.start(),
            end = years.end(),
            season = ?self.config.season,
            threads = self.mode.threads(),
            "loading source collections"
        );
        let prepared = self.load(source, years)?;
        let grid = prepared.run_grid()?;
        self.config.export.check_grid(&grid, years.len())?;

        let compositor = YearlyCompositor::new(years, season)
            .with_region(self.config.region()?)
            .with_grid(grid)
            .with_processor(self.processor);

        let stacks: Vec<(Product, RasterImage)> = Product::ALL
            .into_par_iter()
            .map(|product| {
                let composites = self.composites(product, &prepared, &compositor)?;
                let stack = stack_composites(&composites, product.prefix())?;
                info!(product = %product, bands = stack.band_count(), "stacked");
                Ok((product, stack))
            })
            .collect::<Result<_>>()?;

        Ok(ProductSet { stacks })
    }

    fn load(&self, source: &dyn CollectionSource, years: YearRange) -> Result<Prepared> {
        let (start, end) = years.bounds()?;

        let loaded: Vec<(SourceKind, RasterCollection)> = SourceKind::ALL
            .into_par_iter()
            .map(|kind| {
                let raw = source.load(kind)?;
                raw.validate_schema(&kind.raw_bands())?;
                let raw = raw.filter_date_range(start, end);

                let images: Vec<RasterImage> = raw
                    .images()
                    .into_par_iter()
                    .map(|image| kind.prepare(image))
                    .collect::<Result<_>>()?;
                info!(source = kind.name(), images = images.len(), "masked and scaled");
                Ok((kind, RasterCollection::new(kind.name(), images)))
            })
            .collect::<Result<_>>()?;

        Ok(Prepared {
            collections: loaded.into_iter().collect(),
        })
    }

    fn composites(
        &self,
        product: Product,
        prepared: &Prepared,
        compositor: &YearlyCompositor,
    ) -> Result<Vec<RasterImage>> {
        let season = compositor.season();
        match product {
            Product::Ndvi | Product::Evi | Product::Lai | Product::Fpar => {
                let source = prepared.get(product.sources()[0])?;
                compositor.composite(source, product.composite_band())
            }
            Product::Dtr => {
                let daily = prepared.get(SourceKind::Mod11a1)?;
                let dtr = derive_each(daily, "DTR", diurnal_range_image)?;
                compositor.composite(&dtr, product.composite_band())
            }
            Product::Nmdi => {
                let reflectance = prepared
                    .get(SourceKind::Mod09a1)?
                    .filter_months(season.start_month(), season.end_month());
                let nmdi = derive_each(&reflectance, "NMDI", nmdi_image)?;
                compositor.composite(&nmdi, product.composite_band())
            }
            Product::Vhi => {
                let series = VhiDeriver::new(season)
                    .with_tolerance(self.config.join_tolerance()?)
                    .with_processor(self.processor)
                    .series(
                        prepared.get(SourceKind::Mod13a1)?,
                        prepared.get(SourceKind::Mod11a2)?,
                    )?;
                compositor.composite(&series, product.composite_band())
            }
        }
    }

    /// Write every stack as `<dir>/<PRODUCT>_kharif_<start>to<end>.tif` (+ `.json`)
    ///
    /// Every stack is checked against the export grid before the first
    /// file is written. If a write fails, files already written by this
    /// call are removed.
    pub fn export(&self, products: &ProductSet, dir: &Path) -> Result<Vec<PathBuf>> {
        let exporter = GeoTiffExporter::new(self.config.export.clone());
        for (_, stack) in products.iter() {
            exporter.grid().check(stack)?;
        }

        let mut written = Vec::with_capacity(products.len());
        for (product, stack) in products.iter() {
            match exporter.export(stack, dir, &self.config.file_prefix(product)) {
                Ok(path) => {
                    info!(product = %product, path = %path.display(), "exported");
                    written.push(path);
                }
                Err(e) => {
                    for path in &written {
                        let _ = fs::remove_file(path);
                        let _ = fs::remove_file(path.with_extension("json"));
                    }
                    return Err(e);
                }
            }
        }
        Ok(written)
    }
}

fn derive_each(
    collection: &RasterCollection,
    name: &str,
    derive: fn(&RasterImage) -> Result<RasterImage>,
) -> Result<RasterCollection> {
    let images: Vec<RasterImage> = collection
        .images()
        .into_par_iter()
        .map(derive)
        .collect::<Result<_>>()?;
    Ok(RasterCollection::new(name, images))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.years().unwrap().len(), 21);
        assert_eq!(config.season().unwrap(), Season::new(6, 11).unwrap());
        assert_eq!(config.join_tolerance().unwrap(), Duration::days(8));
        assert_eq!(config.export.crs_transform, [0.5, 0.0, 0.0, 0.0, -0.5, 0.0]);
        assert_eq!(config.file_prefix(Product::Nmdi), "NMDI_kharif_2000to2020");
    }

    #[test]
    fn test_config_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kharif.json");
        fs::write(
            &path,
            r#"{ "start_year": 2005, "end_year": 2007, "region": [[68.0, 8.0], [97.0, 8.0], [97.0, 37.0], [68.0, 37.0]] }"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.years().unwrap().len(), 3);
        assert_eq!(config.season, [6, 11]);
        assert!(config.region().unwrap().is_some());
    }

    #[test]
    fn test_config_validation() {
        let reversed = PipelineConfig {
            start_year: 2020,
            end_year: 2000,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            reversed.validate(),
            Err(Error::InvalidParameter { name: "start_year", .. })
        ));

        let bad_season = PipelineConfig {
            season: [11, 6],
            ..PipelineConfig::default()
        };
        assert!(bad_season.validate().is_err());

        let bad_region = PipelineConfig {
            region: Some(vec![(0.0, 0.0), (1.0, 1.0)]),
            ..PipelineConfig::default()
        };
        assert!(bad_region.validate().is_err());
    }
}
