//! Season-bounded yearly composites
//!
//! Every year in the range produces exactly one composite, even when no
//! image falls in its season window: such a gap becomes an all-no-data
//! raster on the run grid.

use super::reduce::{reduce_series, Reducer};
use super::season::{Season, YearRange};
use crate::maybe_rayon::*;
use kharif_core::raster::{Grid, Raster};
use kharif_core::{
    Error, PropertyValue, RasterCollection, RasterImage, Region, Result, PROP_COMPOSITE_START,
    PROP_YEAR,
};
use kharif_parallel::TiledProcessor;
use tracing::{debug, warn};

/// Builds one mean composite per year of a [`YearRange`]
#[derive(Debug, Clone)]
pub struct YearlyCompositor {
    years: YearRange,
    season: Season,
    region: Option<Region>,
    grid: Option<Grid>,
    processor: TiledProcessor,
}

impl YearlyCompositor {
    pub fn new(years: YearRange, season: Season) -> Self {
        Self {
            years,
            season,
            region: None,
            grid: None,
            processor: TiledProcessor::default(),
        }
    }

    /// Clip every composite to `region`
    pub fn with_region(mut self, region: Option<Region>) -> Self {
        self.region = region;
        self
    }

    /// Grid used when a collection has no images at all
    pub fn with_grid(mut self, grid: Grid) -> Self {
        self.grid = Some(grid);
        self
    }

    pub fn with_processor(mut self, processor: TiledProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    pub fn season(&self) -> Season {
        self.season
    }

    /// Mean of `band` over each year's season window, ascending by year.
    pub fn composite(&self, collection: &RasterCollection, band: &str) -> Result<Vec<RasterImage>> {
        let grid = collection
            .grid()
            .or_else(|| self.grid.clone())
            .ok_or_else(|| {
                Error::invalid_parameter(
                    "collection",
                    collection.name(),
                    "no images and no run grid to place empty composites on",
                )
            })?;

        let years: Vec<i32> = self.years.iter().collect();
        years
            .into_par_iter()
            .map(|year| self.composite_year(collection, band, year, &grid))
            .collect()
    }

    fn composite_year(
        &self,
        collection: &RasterCollection,
        band: &str,
        year: i32,
        grid: &Grid,
    ) -> Result<RasterImage> {
        let window = collection
            .filter_year(year)
            .filter_months(self.season.start_month(), self.season.end_month());
        let series = window.band_series(band)?;

        let mean = if series.is_empty() {
            warn!(
                year,
                collection = collection.name(),
                band,
                "no images in season window, composite left empty"
            );
            Raster::empty(grid)
        } else {
            debug!(year, band, images = series.len(), "compositing");
            reduce_series(&series, grid, Reducer::Mean, &self.processor)?
        };

        let mean = match &self.region {
            Some(region) => region.clip(&mean)?,
            None => mean,
        };

        let start = self.season.start_of(year)?;
        Ok(RasterImage::from_band(band, mean, start)
            .with_property(PROP_YEAR, PropertyValue::Int(year as i64))
            .with_property(PROP_COMPOSITE_START, PropertyValue::Time(start)))
    }
}

/// Per-year season mean of `band` over `years`, without region clipping.
///
/// The collection must hold at least one image so that empty years have
/// a grid; use [`YearlyCompositor::with_grid`] otherwise.
pub fn yearly_mean(
    collection: &RasterCollection,
    band: &str,
    years: YearRange,
    season: Season,
) -> Result<Vec<RasterImage>> {
    YearlyCompositor::new(years, season).composite(collection, band)
}
