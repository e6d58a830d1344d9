//! Per-pixel reductions over a stack of co-registered rasters

use kharif_core::raster::{Grid, Raster};
use kharif_core::Result;
use kharif_parallel::TiledProcessor;

/// Statistic computed across the series at each pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Mean,
    Min,
    Max,
}

impl Reducer {
    /// Reduce the valid values of one pixel; `None` when there are none
    pub fn reduce<I>(self, values: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut acc = match self {
            Reducer::Mean => 0.0,
            Reducer::Min => f64::INFINITY,
            Reducer::Max => f64::NEG_INFINITY,
        };
        for v in values {
            count += 1;
            acc = match self {
                Reducer::Mean => acc + v,
                Reducer::Min => acc.min(v),
                Reducer::Max => acc.max(v),
            };
        }
        match (count, self) {
            (0, _) => None,
            (n, Reducer::Mean) => Some(acc / n as f64),
            _ => Some(acc),
        }
    }
}

/// Reduce `series` pixel by pixel onto `grid`.
///
/// Only valid cells contribute. A pixel with no valid contribution (or an
/// empty series) is no-data. Every raster must be co-registered with `grid`.
pub fn reduce_series(
    series: &[&Raster<f64>],
    grid: &Grid,
    reducer: Reducer,
    processor: &TiledProcessor,
) -> Result<Raster<f64>> {
    for raster in series {
        grid.ensure_matches(&raster.grid(), "temporal reduction")?;
    }

    processor.generate(grid, |row, col| {
        reducer.reduce(series.iter().filter_map(|r| r.cell(row, col)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kharif_core::{Error, GeoTransform, CRS};

    fn grid() -> Grid {
        Grid::new(4, 4, GeoTransform::new(70.0, 30.0, 0.5, -0.5), CRS::wgs84())
    }

    fn layer(value: f64) -> Raster<f64> {
        Raster::filled(4, 4, value).on_grid(&grid())
    }

    #[test]
    fn test_reducers() {
        let values = [3.0, -1.0, 7.0];
        assert_relative_eq!(Reducer::Mean.reduce(values).unwrap(), 3.0);
        assert_eq!(Reducer::Min.reduce(values), Some(-1.0));
        assert_eq!(Reducer::Max.reduce(values), Some(7.0));
        assert_eq!(Reducer::Mean.reduce(std::iter::empty::<f64>()), None);
    }

    #[test]
    fn test_mean_ignores_nodata() {
        let a = layer(0.2);
        let mut b = layer(0.6);
        b.invalidate(1, 1).unwrap();
        let mut c = layer(1.0);
        c.invalidate(1, 1).unwrap();
        c.invalidate(0, 0).unwrap();

        let mean = reduce_series(&[&a, &b, &c], &grid(), Reducer::Mean, &TiledProcessor::new(3))
            .unwrap();
        assert_relative_eq!(mean.cell(2, 2).unwrap(), 0.6, epsilon = 1e-12);
        assert_relative_eq!(mean.cell(0, 0).unwrap(), 0.4, epsilon = 1e-12);
        assert_relative_eq!(mean.cell(1, 1).unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_is_order_independent() {
        let (a, b, c) = (layer(0.1), layer(0.35), layer(0.9));
        let p = TiledProcessor::default();
        let m1 = reduce_series(&[&a, &b, &c], &grid(), Reducer::Mean, &p).unwrap();
        let m2 = reduce_series(&[&c, &a, &b], &grid(), Reducer::Mean, &p).unwrap();
        assert_relative_eq!(m1.cell(3, 3).unwrap(), m2.cell(3, 3).unwrap(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_series_is_all_nodata() {
        let out = reduce_series(&[], &grid(), Reducer::Max, &TiledProcessor::default()).unwrap();
        assert_eq!(out.shape(), (4, 4));
        assert_eq!(out.valid_count(), 0);
    }

    #[test]
    fn test_off_grid_member() {
        let stray = Raster::filled(4, 4, 1.0);
        let err = reduce_series(&[&stray], &grid(), Reducer::Mean, &TiledProcessor::default())
            .unwrap_err();
        assert!(matches!(err, Error::GridMismatch { .. }));
    }
}
