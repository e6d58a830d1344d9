//! Vegetation Health Index
//!
//! Two passes. The first reduces the *whole* NDVI and daytime LST
//! records to per-pixel min/max; the second joins the season-restricted
//! series in time and normalizes each pair against those extremes:
//!
//! ```text
//! VCI = (NDVI - NDVImin) / (NDVImax - NDVImin)
//! TCI = (LSTmax - LST) / (LSTmax - LSTmin)
//! VHI = 0.5 * VCI + 0.5 * TCI
//! ```
//!
//! Pixels where either record has a zero range carry no VHI.

use crate::imagery::{temperature_condition, vegetation_condition, vegetation_health};
use crate::maybe_rayon::*;
use crate::temporal::{
    join_nearest, reduce_series, JoinedPair, Reducer, Season, YearRange, YearlyCompositor,
    DEFAULT_JOIN_TOLERANCE_DAYS,
};
use chrono::Duration;
use kharif_core::raster::{Grid, Raster};
use kharif_core::{Error, RasterCollection, RasterImage, Result};
use kharif_parallel::TiledProcessor;
use ndarray::{Array2, Zip};
use tracing::debug;

const NDVI_BAND: &str = "NDVI";
const LST_BAND: &str = "LST_Day_1km";

/// Whole-record per-pixel extremes of NDVI and daytime LST
#[derive(Debug, Clone)]
pub struct RecordExtremes {
    pub ndvi_min: Raster<f64>,
    pub ndvi_max: Raster<f64>,
    pub lst_min: Raster<f64>,
    pub lst_max: Raster<f64>,
    /// `true` where both ranges are strictly positive
    pub valid_mask: Array2<bool>,
}

impl RecordExtremes {
    /// Reduce every image of both records, all years and all months.
    pub fn compute(
        veg: &RasterCollection,
        lst: &RasterCollection,
        processor: &TiledProcessor,
    ) -> Result<Self> {
        let grid = record_grid(veg, lst)?;

        let ndvi = veg.band_series(NDVI_BAND)?;
        let temp = lst.band_series(LST_BAND)?;

        let ndvi_min = reduce_series(&ndvi, &grid, Reducer::Min, processor)?;
        let ndvi_max = reduce_series(&ndvi, &grid, Reducer::Max, processor)?;
        let lst_min = reduce_series(&temp, &grid, Reducer::Min, processor)?;
        let lst_max = reduce_series(&temp, &grid, Reducer::Max, processor)?;

        let mut valid_mask = Array2::from_elem(grid.shape(), false);
        Zip::indexed(&mut valid_mask).for_each(|(row, col), keep| {
            let positive = |lo: &Raster<f64>, hi: &Raster<f64>| match (lo.cell(row, col), hi.cell(row, col)) {
                (Some(lo), Some(hi)) => hi - lo > 0.0,
                _ => false,
            };
            *keep = positive(&ndvi_min, &ndvi_max) && positive(&lst_min, &lst_max);
        });

        let masked = valid_mask.iter().filter(|&&v| !v).count();
        if masked > 0 {
            debug!(masked, "pixels without a usable NDVI or LST range");
        }

        Ok(Self {
            ndvi_min,
            ndvi_max,
            lst_min,
            lst_max,
            valid_mask,
        })
    }

    pub fn grid(&self) -> Grid {
        self.ndvi_min.grid()
    }
}

fn record_grid(veg: &RasterCollection, lst: &RasterCollection) -> Result<Grid> {
    match (veg.grid(), lst.grid()) {
        (Some(v), Some(l)) => {
            v.ensure_matches(&l, "VHI records")?;
            Ok(v)
        }
        (Some(g), None) | (None, Some(g)) => Ok(g),
        (None, None) => Err(Error::invalid_parameter(
            "collection",
            format!("{} / {}", veg.name(), lst.name()),
            "both VHI records are empty",
        )),
    }
}

/// `VCI`, `TCI` and `VHI` bands for one joined pair, masked to
/// `extremes.valid_mask` and stamped with the primary's time and properties.
pub fn health_components(pair: &JoinedPair<'_>, extremes: &RecordExtremes) -> Result<RasterImage> {
    let ndvi = pair.primary.band(NDVI_BAND)?;
    let lst = pair.secondary.band(LST_BAND)?;

    let vci = vegetation_condition(ndvi, &extremes.ndvi_min, &extremes.ndvi_max)?
        .masked(&extremes.valid_mask)?;
    let tci = temperature_condition(lst, &extremes.lst_min, &extremes.lst_max)?
        .masked(&extremes.valid_mask)?;
    let vhi = vegetation_health(&vci, &tci)?;

    RasterImage::from_band("VCI", vci, pair.primary.timestamp())
        .with_metadata_of(pair.primary)
        .with_band("TCI", tci)?
        .with_band("VHI", vhi)
}

/// Derives per-timestep VHI from a vegetation and a temperature record
#[derive(Debug, Clone)]
pub struct VhiDeriver {
    season: Season,
    tolerance: Duration,
    processor: TiledProcessor,
    keep_components: bool,
}

impl Default for VhiDeriver {
    fn default() -> Self {
        Self::new(Season::default())
    }
}

impl VhiDeriver {
    pub fn new(season: Season) -> Self {
        Self {
            season,
            tolerance: Duration::days(DEFAULT_JOIN_TOLERANCE_DAYS),
            processor: TiledProcessor::default(),
            keep_components: false,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_processor(mut self, processor: TiledProcessor) -> Self {
        self.processor = processor;
        self
    }

    /// Keep the `VCI` and `TCI` bands next to `VHI`
    pub fn with_components(mut self, keep: bool) -> Self {
        self.keep_components = keep;
        self
    }

    /// One image per joined in-season pair, in vegetation-record order.
    pub fn series(&self, veg: &RasterCollection, lst: &RasterCollection) -> Result<RasterCollection> {
        if veg.is_empty() || lst.is_empty() {
            debug!(veg = veg.len(), lst = lst.len(), "VHI record empty, no series");
            return Ok(RasterCollection::empty("VHI"));
        }

        let extremes = RecordExtremes::compute(veg, lst, &self.processor)?;

        let veg_season = veg.filter_months(self.season.start_month(), self.season.end_month());
        let lst_season = lst.filter_months(self.season.start_month(), self.season.end_month());
        let pairs = join_nearest(&veg_season, &lst_season, self.tolerance);
        debug!(pairs = pairs.len(), "joined vegetation and temperature records");

        let images: Vec<RasterImage> = pairs
            .into_par_iter()
            .map(|pair| {
                let components = health_components(&pair, &extremes)?;
                if self.keep_components {
                    Ok(components)
                } else {
                    components.select(&["VHI"])
                }
            })
            .collect::<Result<_>>()?;

        Ok(RasterCollection::new("VHI", images))
    }
}

/// Per-timestep VHI over the season window with the default 8-day join
pub fn vhi_series(
    veg: &RasterCollection,
    lst: &RasterCollection,
    season: Season,
) -> Result<RasterCollection> {
    VhiDeriver::new(season).series(veg, lst)
}

/// Yearly mean VHI composites over `years`
pub fn vhi(
    veg: &RasterCollection,
    lst: &RasterCollection,
    years: YearRange,
    season: Season,
) -> Result<Vec<RasterImage>> {
    let series = vhi_series(veg, lst, season)?;
    let mut compositor = YearlyCompositor::new(years, season);
    if let Ok(grid) = record_grid(veg, lst) {
        compositor = compositor.with_grid(grid);
    }
    compositor.composite(&series, "VHI")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn image(band: &str, y: i32, m: u32, d: u32, values: Vec<f64>) -> RasterImage {
        let t = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap();
        RasterImage::from_band(band, Raster::from_vec(values, 1, 3).unwrap(), t)
    }

    /// Column 2 has a flat NDVI record, so it is outside the valid mask
    fn records() -> (RasterCollection, RasterCollection) {
        let veg = RasterCollection::new(
            "MOD13A1",
            vec![
                image(NDVI_BAND, 2004, 1, 17, vec![0.2, 0.3, 0.4]), // off-season minimum
                image(NDVI_BAND, 2004, 7, 11, vec![0.5, 0.45, 0.4]),
                image(NDVI_BAND, 2004, 8, 12, vec![0.8, 0.6, 0.4]),
            ],
        );
        let lst = RasterCollection::new(
            "MOD11A2",
            vec![
                image(LST_BAND, 2004, 5, 8, vec![40.0, 41.0, 35.0]),
                image(LST_BAND, 2004, 7, 14, vec![25.0, 33.0, 30.0]),
                image(LST_BAND, 2004, 8, 12, vec![10.0, 17.0, 25.0]),
            ],
        );
        (veg, lst)
    }

    #[test]
    fn test_extremes_use_whole_record() {
        let (veg, lst) = records();
        let ex = RecordExtremes::compute(&veg, &lst, &TiledProcessor::default()).unwrap();

        assert_eq!(ex.ndvi_min.cell(0, 0), Some(0.2));
        assert_eq!(ex.ndvi_max.cell(0, 0), Some(0.8));
        assert_eq!(ex.lst_max.cell(0, 0), Some(40.0));
        assert_eq!(ex.lst_min.cell(0, 0), Some(10.0));
        assert_eq!(ex.valid_mask.as_slice().unwrap(), &[true, true, false]);
    }

    #[test]
    fn test_midpoint_pixel_is_half() {
        let (veg, lst) = records();
        let series = VhiDeriver::default()
            .with_components(true)
            .series(&veg, &lst)
            .unwrap();

        // Jul 11 pairs with Jul 14 (3 days), Aug 12 with Aug 12
        assert_eq!(series.len(), 2);
        let first = &series.images()[0];
        assert_eq!(first.band_names(), vec!["VCI", "TCI", "VHI"]);
        for band in ["VCI", "TCI", "VHI"] {
            assert_relative_eq!(first.band(band).unwrap().cell(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        }
        assert_eq!(first.band("VHI").unwrap().cell(0, 2), None);
    }

    #[test]
    fn test_components_bounded() {
        let (veg, lst) = records();
        let series = VhiDeriver::default()
            .with_components(true)
            .series(&veg, &lst)
            .unwrap();

        for image in series.iter() {
            for band in image.bands() {
                for row in 0..band.raster.rows() {
                    for col in 0..band.raster.cols() {
                        if let Some(v) = band.raster.cell(row, col) {
                            assert!((0.0..=1.0).contains(&v), "{} = {}", band.name, v);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_yearly_vhi() {
        let (veg, lst) = records();
        let composites = vhi(&veg, &lst, YearRange::new(2003, 2004).unwrap(), Season::default())
            .unwrap();

        assert_eq!(composites.len(), 2);
        assert_eq!(composites[0].band("VHI").unwrap().valid_count(), 0);
        let v2004 = composites[1].band("VHI").unwrap();
        // Aug 12: VCI = 1.0, TCI = 1.0
        assert_relative_eq!(v2004.cell(0, 0).unwrap(), 0.75, epsilon = 1e-12);
        assert_eq!(v2004.cell(0, 2), None);
    }

    #[test]
    fn test_empty_record_gives_empty_series() {
        let (veg, _) = records();
        let series = vhi_series(&veg, &RasterCollection::empty("MOD11A2"), Season::default()).unwrap();
        assert!(series.is_empty());
    }
}
