//! Source collections and the derived products built from them
//!
//! - `SourceKind`: the five MODIS collections read by a run, with their
//!   band schema, QA rule and scale transform
//! - `Product`: the seven yearly composites a run produces
//! - Per-image band algebra (DTR, NMDI), VHI and year-ordered stacking

mod derive;
mod stack;
mod vhi;

pub use derive::{diurnal_range_image, nmdi_image};
pub use stack::stack_composites;
pub use vhi::{health_components, vhi, vhi_series, RecordExtremes, VhiDeriver};

use crate::imagery::{
    QaRule, ScaleRule, LAI_FPAR_QA, LAI_FPAR_SCALE, LST_QA, LST_SCALE, REFLECTANCE_QA,
    REFLECTANCE_SCALE, VEGETATION_QA, VEGETATION_SCALE,
};
use kharif_core::{RasterImage, Result};
use std::fmt;

/// Raw satellite collections consumed by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceKind {
    /// 16-day 500 m vegetation indices
    Mod13a1,
    /// 8-day 1 km land surface temperature
    Mod11a2,
    /// Daily 1 km land surface temperature
    Mod11a1,
    /// 4-day 500 m leaf area index / FPAR
    Mcd15a3h,
    /// 8-day 500 m surface reflectance
    Mod09a1,
}

impl SourceKind {
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Mod13a1,
        SourceKind::Mod11a2,
        SourceKind::Mod11a1,
        SourceKind::Mcd15a3h,
        SourceKind::Mod09a1,
    ];

    /// Product short name, also the directory name on disk
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Mod13a1 => "MOD13A1",
            SourceKind::Mod11a2 => "MOD11A2",
            SourceKind::Mod11a1 => "MOD11A1",
            SourceKind::Mcd15a3h => "MCD15A3H",
            SourceKind::Mod09a1 => "MOD09A1",
        }
    }

    /// Nominal revisit interval in days
    pub fn cadence_days(&self) -> u32 {
        match self {
            SourceKind::Mod13a1 => 16,
            SourceKind::Mod11a2 | SourceKind::Mod09a1 => 8,
            SourceKind::Mod11a1 => 1,
            SourceKind::Mcd15a3h => 4,
        }
    }

    pub fn qa_rule(&self) -> QaRule {
        match self {
            SourceKind::Mod13a1 => VEGETATION_QA,
            SourceKind::Mod11a2 | SourceKind::Mod11a1 => LST_QA,
            SourceKind::Mcd15a3h => LAI_FPAR_QA,
            SourceKind::Mod09a1 => REFLECTANCE_QA,
        }
    }

    pub fn scale_rule(&self) -> ScaleRule {
        match self {
            SourceKind::Mod13a1 => VEGETATION_SCALE,
            SourceKind::Mod11a2 | SourceKind::Mod11a1 => LST_SCALE,
            SourceKind::Mcd15a3h => LAI_FPAR_SCALE,
            SourceKind::Mod09a1 => REFLECTANCE_SCALE,
        }
    }

    /// Every band a raw image must carry: the scaled bands, then QA
    pub fn raw_bands(&self) -> Vec<&'static str> {
        let mut bands = self.scale_rule().bands.to_vec();
        bands.push(self.qa_rule().band);
        bands
    }

    /// Mask then scale one raw image
    pub fn prepare(&self, image: &RasterImage) -> Result<RasterImage> {
        let masked = self.qa_rule().apply(image)?;
        self.scale_rule().apply(&masked)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The yearly composite products of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Product {
    Ndvi,
    Evi,
    Lai,
    Fpar,
    Dtr,
    Nmdi,
    Vhi,
}

impl Product {
    pub const ALL: [Product; 7] = [
        Product::Ndvi,
        Product::Evi,
        Product::Lai,
        Product::Fpar,
        Product::Dtr,
        Product::Nmdi,
        Product::Vhi,
    ];

    /// Band-name prefix of the stacked output
    pub fn prefix(&self) -> &'static str {
        match self {
            Product::Ndvi => "NDVI",
            Product::Evi => "EVI",
            Product::Lai => "LAI",
            Product::Fpar => "FPAR",
            Product::Dtr => "DTR",
            Product::Nmdi => "NMDI",
            Product::Vhi => "VHI",
        }
    }

    /// Band averaged into the yearly composite
    pub fn composite_band(&self) -> &'static str {
        match self {
            Product::Ndvi => "NDVI",
            Product::Evi => "EVI",
            Product::Lai => "Lai",
            Product::Fpar => "Fpar",
            Product::Dtr => "DTR",
            Product::Nmdi => "NMDI",
            Product::Vhi => "VHI",
        }
    }

    /// Collections the product is derived from
    pub fn sources(&self) -> &'static [SourceKind] {
        match self {
            Product::Ndvi | Product::Evi => &[SourceKind::Mod13a1],
            Product::Lai | Product::Fpar => &[SourceKind::Mcd15a3h],
            Product::Dtr => &[SourceKind::Mod11a1],
            Product::Nmdi => &[SourceKind::Mod09a1],
            Product::Vhi => &[SourceKind::Mod13a1, SourceKind::Mod11a2],
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Product> {
        Product::ALL
            .into_iter()
            .find(|p| p.prefix().eq_ignore_ascii_case(prefix))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use kharif_core::Raster;

    #[test]
    fn test_raw_schema() {
        assert_eq!(
            SourceKind::Mod09a1.raw_bands(),
            vec!["sur_refl_b02", "sur_refl_b06", "sur_refl_b07", "StateQA"]
        );
        assert_eq!(SourceKind::Mod11a1.qa_rule(), LST_QA);
        assert_eq!(SourceKind::Mod11a1.scale_rule(), LST_SCALE);
    }

    #[test]
    fn test_prepare_masks_then_scales() {
        let t = Utc.with_ymd_and_hms(2001, 9, 14, 0, 0, 0).unwrap();
        let mut qa = Raster::filled(2, 2, 0.0);
        qa.set(0, 1, 2.0).unwrap(); // fails bits 0-1
        qa.set(1, 1, 4.0).unwrap(); // bit 2 ignored
        let raw = RasterImage::from_band("NDVI", Raster::filled(2, 2, 7000.0), t)
            .with_band("EVI", Raster::filled(2, 2, 4000.0))
            .unwrap()
            .with_band("SummaryQA", qa)
            .unwrap();

        let ready = SourceKind::Mod13a1.prepare(&raw).unwrap();
        assert_eq!(ready.band_names(), vec!["NDVI", "EVI"]);
        let ndvi = ready.band("NDVI").unwrap();
        assert_relative_eq!(ndvi.cell(0, 0).unwrap(), 0.7, epsilon = 1e-12);
        assert_eq!(ndvi.cell(0, 1), None);
        assert!(ndvi.cell(1, 1).is_some());
    }

    #[test]
    fn test_product_catalogue() {
        let prefixes: Vec<_> = Product::ALL.iter().map(|p| p.prefix()).collect();
        assert_eq!(prefixes, vec!["NDVI", "EVI", "LAI", "FPAR", "DTR", "NMDI", "VHI"]);
        assert_eq!(Product::from_prefix("nmdi"), Some(Product::Nmdi));
        assert_eq!(Product::from_prefix("SPI"), None);
        assert_eq!(Product::Vhi.sources().len(), 2);
    }
}
