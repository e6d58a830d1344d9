//! Unit scaling of raw integer bands
//!
//! `value * multiplier + offset`, applied after quality masking.

use super::band_math::band_math;
use kharif_core::{Error, RasterImage, Result};

/// Fixed scale transform for a product's bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRule {
    pub bands: &'static [&'static str],
    /// One entry broadcast to every band, or one per band
    pub multipliers: &'static [f64],
    pub offset: f64,
}

/// MOD13A1 vegetation indices
pub const VEGETATION_SCALE: ScaleRule = ScaleRule {
    bands: &["NDVI", "EVI"],
    multipliers: &[0.0001],
    offset: 0.0,
};

/// MOD11A2 / MOD11A1 land surface temperature, Kelvin*50 to Celsius
pub const LST_SCALE: ScaleRule = ScaleRule {
    bands: &["LST_Day_1km", "LST_Night_1km"],
    multipliers: &[0.02],
    offset: -273.15,
};

/// MCD15A3H leaf area index and FPAR
pub const LAI_FPAR_SCALE: ScaleRule = ScaleRule {
    bands: &["Lai", "Fpar"],
    multipliers: &[0.1, 0.01],
    offset: 0.0,
};

/// MOD09A1 surface reflectance
pub const REFLECTANCE_SCALE: ScaleRule = ScaleRule {
    bands: &["sur_refl_b02", "sur_refl_b06", "sur_refl_b07"],
    multipliers: &[0.0001],
    offset: 0.0,
};

impl ScaleRule {
    pub fn apply(&self, image: &RasterImage) -> Result<RasterImage> {
        scale(image, self.bands, self.multipliers, self.offset)
    }
}

/// Select `bands` and rescale them.
///
/// `multipliers` has one entry (broadcast) or one per band. Invalid
/// cells stay invalid; timestamp and properties are kept.
pub fn scale(
    image: &RasterImage,
    bands: &[&str],
    multipliers: &[f64],
    offset: f64,
) -> Result<RasterImage> {
    if multipliers.len() != 1 && multipliers.len() != bands.len() {
        return Err(Error::invalid_parameter(
            "multipliers",
            format!("{:?}", multipliers),
            format!("expected 1 or {} entries", bands.len()),
        ));
    }

    let mut scaled = RasterImage::new(image.timestamp()).with_metadata_of(image);
    for (i, &name) in bands.iter().enumerate() {
        let m = if multipliers.len() == 1 {
            multipliers[0]
        } else {
            multipliers[i]
        };
        let raster = band_math(image.band(name)?, |v| Some(v * m + offset))?;
        scaled = scaled.with_band(name, raster)?;
    }
    Ok(scaled)
}
