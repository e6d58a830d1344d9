//! Zonal statistics
//!
//! Each zone is a named polygon (a state, a district). A cell belongs to
//! a zone when its centre lies inside the polygon, the same rule used to
//! clip composites. For every `<prefix>_<year>` band of a stack, the zone
//! value is the mean of its valid cells.

use crate::maybe_rayon::*;
use kharif_core::raster::Raster;
use kharif_core::{Error, RasterImage, Region, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Zone as written in a zone file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDef {
    /// Defaults to the position in the file
    #[serde(default)]
    pub id: Option<usize>,
    pub name: String,
    /// Exterior ring, `(x, y)` in the CRS of the stacks
    pub ring: Vec<(f64, f64)>,
}

/// A named zone
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: usize,
    pub name: String,
    pub region: Region,
}

impl Zone {
    pub fn new(id: usize, name: impl Into<String>, region: Region) -> Self {
        Self {
            id,
            name: name.into(),
            region,
        }
    }

    fn from_def(index: usize, def: ZoneDef) -> Result<Self> {
        let region = Region::from_ring(&def.ring)?;
        Ok(Self::new(def.id.unwrap_or(index), def.name, region))
    }
}

/// Read a JSON array of [`ZoneDef`]
pub fn load_zones(path: &Path) -> Result<Vec<Zone>> {
    let text = fs::read_to_string(path)?;
    let defs: Vec<ZoneDef> = serde_json::from_str(&text)?;
    defs.into_iter()
        .enumerate()
        .map(|(index, def)| Zone::from_def(index, def))
        .collect()
}

/// One output row: the mean of one band over one zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonalRow {
    pub id: usize,
    pub region_name: String,
    pub index_name: String,
    pub year: i32,
    /// `None` when the zone holds no valid cell
    pub value: Option<f64>,
}

/// Mean of the valid cells of `values` where `zone` is `true`
pub fn zonal_mean(values: &Raster<f64>, zone: &Array2<bool>) -> Result<Option<f64>> {
    let (er, ec) = values.shape();
    let (ar, ac) = zone.dim();
    if (er, ec) != (ar, ac) {
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }

    let (sum, count) = zone
        .indexed_iter()
        .filter(|(_, inside)| **inside)
        .filter_map(|((row, col), _)| values.cell(row, col))
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    Ok((count > 0).then(|| sum / count as f64))
}

/// `NDVI_2005` -> `("NDVI", 2005)`
fn split_band_name(name: &str) -> Result<(&str, i32)> {
    name.rsplit_once('_')
        .and_then(|(prefix, year)| Some((prefix, year.parse().ok()?)))
        .filter(|(prefix, _)| !prefix.is_empty())
        .ok_or_else(|| {
            Error::SchemaMismatch(format!("band '{}' is not named <prefix>_<year>", name))
        })
}

/// Rows for every (zone, band) pair of one stack, zone-major in band order
pub fn zonal_means(stack: &RasterImage, zones: &[Zone]) -> Result<Vec<ZonalRow>> {
    let grid = stack
        .grid()
        .ok_or_else(|| Error::SchemaMismatch("stack has no bands".into()))?;
    let bands = stack
        .bands()
        .map(|band| Ok((split_band_name(&band.name)?, &band.raster)))
        .collect::<Result<Vec<_>>>()?;

    let per_zone: Vec<Vec<ZonalRow>> = zones
        .into_par_iter()
        .map(|zone| {
            let mask = zone.region.mask_for(&grid);
            bands
                .iter()
                .map(|&((index_name, year), raster)| {
                    Ok(ZonalRow {
                        id: zone.id,
                        region_name: zone.name.clone(),
                        index_name: index_name.to_string(),
                        year,
                        value: zonal_mean(raster, &mask)?,
                    })
                })
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<_>>()?;

    Ok(per_zone.into_iter().flatten().collect())
}

/// Rows of several stacks, sorted by region name, index name and year
pub fn zonal_table(stacks: &[RasterImage], zones: &[Zone]) -> Result<Vec<ZonalRow>> {
    let mut rows = Vec::new();
    for stack in stacks {
        rows.extend(zonal_means(stack, zones)?);
    }
    rows.sort_by(|a, b| {
        (&a.region_name, &a.index_name, a.year, a.id)
            .cmp(&(&b.region_name, &b.index_name, b.year, b.id))
    });
    Ok(rows)
}

/// Write rows as CSV with an `id,region_name,index_name,year,value` header.
/// Empty zones leave `value` blank.
pub fn write_zonal_csv(rows: &[ZonalRow], path: &Path) -> Result<()> {
    let csv_error = |e: csv::Error| Error::Export(format!("{}: {}", path.display(), e));
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    for row in rows {
        writer.serialize(row).map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use kharif_core::{GeoTransform, Grid, CRS};

    // 4x4 grid of 1-degree cells from (0, 4) down to (4, 0)
    fn grid() -> Grid {
        Grid::new(4, 4, GeoTransform::new(0.0, 4.0, 1.0, -1.0), CRS::wgs84())
    }

    fn square(id: usize, name: &str, x0: f64, x1: f64) -> Zone {
        let ring = [(x0, 0.0), (x1, 0.0), (x1, 4.0), (x0, 4.0)];
        Zone::new(id, name, Region::from_ring(&ring).unwrap())
    }

    /// Cell value = column index, except an invalid cell at (0, 0)
    fn stack(bands: &[&str]) -> RasterImage {
        let t = Utc.with_ymd_and_hms(2001, 6, 1, 0, 0, 0).unwrap();
        let mut raster = Raster::new(4, 4).on_grid(&grid());
        for row in 0..4 {
            for col in 0..4 {
                raster.set(row, col, col as f64).unwrap();
            }
        }
        raster.invalidate(0, 0).unwrap();
        bands
            .iter()
            .try_fold(RasterImage::new(t), |image, name| image.with_band(*name, raster.clone()))
            .unwrap()
    }

    #[test]
    fn test_mean_skips_nodata() {
        let left = square(0, "West", 0.0, 2.0);
        let raster = stack(&["NDVI_2001"]).band("NDVI_2001").unwrap().clone();
        let mean = zonal_mean(&raster, &left.region.mask_for(&grid())).unwrap();
        // cols 0 and 1, seven valid cells: 3 zeros and 4 ones
        assert_relative_eq!(mean.unwrap(), 4.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_zone_has_no_value() {
        let raster = Raster::filled(4, 4, 1.0).on_grid(&grid());
        let outside = square(0, "Elsewhere", 10.0, 12.0);
        assert_eq!(zonal_mean(&raster, &outside.region.mask_for(&grid())).unwrap(), None);

        let mut blank = raster.clone();
        for row in 0..4 {
            blank.invalidate(row, 0).unwrap();
        }
        let first_col = square(1, "Strip", 0.0, 1.0);
        assert_eq!(zonal_mean(&blank, &first_col.region.mask_for(&grid())).unwrap(), None);
    }

    #[test]
    fn test_mask_shape_must_match() {
        let raster = Raster::filled(4, 4, 1.0);
        let mask = Array2::from_elem((3, 4), true);
        assert!(matches!(zonal_mean(&raster, &mask), Err(Error::SizeMismatch { .. })));
    }

    #[test]
    fn test_rows_per_zone_and_band() {
        let zones = [square(7, "West", 0.0, 2.0), square(3, "East", 2.0, 4.0)];
        let rows = zonal_means(&stack(&["LAI_2002", "LAI_2003"]), &zones).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].id, 7);
        assert_eq!(rows[0].index_name, "LAI");
        assert_eq!(rows[0].year, 2002);
        assert_eq!(rows[1].year, 2003);
        assert_eq!(rows[2].region_name, "East");
        assert_relative_eq!(rows[2].value.unwrap(), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_band_names_need_a_year() {
        let zones = [square(0, "West", 0.0, 2.0)];
        let err = zonal_means(&stack(&["NDVI"]), &zones).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(zonal_means(&stack(&["_2001"]), &zones).is_err());
    }

    #[test]
    fn test_table_sorted_by_region_index_year() {
        let zones = [square(0, "West", 0.0, 2.0), square(1, "East", 2.0, 4.0)];
        let stacks = [stack(&["VHI_2001", "VHI_2000"]), stack(&["DTR_2000"])];
        let rows = zonal_table(&stacks, &zones).unwrap();

        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.region_name.as_str(), r.index_name.as_str(), r.year))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("East", "DTR", 2000),
                ("East", "VHI", 2000),
                ("East", "VHI", 2001),
                ("West", "DTR", 2000),
                ("West", "VHI", 2000),
                ("West", "VHI", 2001),
            ]
        );
    }

    #[test]
    fn test_load_zones_defaults_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.json");
        fs::write(
            &path,
            r#"[
                { "name": "West", "ring": [[0, 0], [2, 0], [2, 4], [0, 4]] },
                { "id": 42, "name": "East", "ring": [[2, 0], [4, 0], [4, 4], [2, 4]] }
            ]"#,
        )
        .unwrap();

        let zones = load_zones(&path).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!((zones[0].id, zones[0].name.as_str()), (0, "West"));
        assert_eq!((zones[1].id, zones[1].name.as_str()), (42, "East"));

        fs::write(&path, r#"[{ "name": "Line", "ring": [[0, 0], [1, 1]] }]"#).unwrap();
        assert!(matches!(load_zones(&path), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_csv_leaves_empty_values_blank() {
        let rows = vec![
            ZonalRow {
                id: 0,
                region_name: "West".into(),
                index_name: "NDVI".into(),
                year: 2001,
                value: Some(0.5),
            },
            ZonalRow {
                id: 0,
                region_name: "West".into(),
                index_name: "NDVI".into(),
                year: 2002,
                value: None,
            },
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zonal.csv");
        write_zonal_csv(&rows, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "id,region_name,index_name,year,value",
                "0,West,NDVI,2001,0.5",
                "0,West,NDVI,2002,",
            ]
        );
    }
}
