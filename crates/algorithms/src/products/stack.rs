//! Year-ordered multi-band stacks

use kharif_core::{Error, PropertyValue, RasterImage, Result};
use std::collections::BTreeMap;

/// Merge single-band yearly composites into one image with bands
/// `<prefix>_<year>`, ascending by year whatever the input order.
///
/// Every composite needs a `year` property and exactly one band, years
/// must be unique and all composites must share one grid.
pub fn stack_composites(composites: &[RasterImage], prefix: &str) -> Result<RasterImage> {
    let mut by_year: BTreeMap<i32, &RasterImage> = BTreeMap::new();
    for composite in composites {
        let year = composite.year_property().ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "{} composite at {} has no year property",
                prefix,
                composite.timestamp().format("%Y-%m-%d")
            ))
        })?;
        if composite.band_count() != 1 {
            return Err(Error::SchemaMismatch(format!(
                "{} composite for {} has {} bands, expected 1",
                prefix,
                year,
                composite.band_count()
            )));
        }
        if by_year.insert(year, composite).is_some() {
            return Err(Error::SchemaMismatch(format!(
                "duplicate {} composite for {}",
                prefix, year
            )));
        }
    }

    let mut stack: Option<RasterImage> = None;
    for (year, composite) in by_year {
        let name = format!("{}_{}", prefix, year);
        let band = match composite.bands().next() {
            Some(b) => b.raster.clone(),
            None => continue,
        };
        stack = Some(match stack {
            None => RasterImage::from_band(name, band, composite.timestamp())
                .with_property("product", PropertyValue::String(prefix.to_string())),
            Some(s) => s.with_band(name, band)?,
        });
    }

    stack.ok_or_else(|| Error::invalid_parameter("composites", prefix, "nothing to stack"))
}
