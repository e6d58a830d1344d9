//! QA bit masking
//!
//! MODIS products ship a quality band whose low bits summarize pixel
//! reliability. A pixel is kept when `qa & bitmask == required`.

use kharif_core::raster::Raster;
use kharif_core::{RasterImage, Result};
use ndarray::Array2;

/// How a product's QA band selects usable pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaRule {
    /// Name of the QA band
    pub band: &'static str,
    pub bitmask: u32,
    /// Value `qa & bitmask` must equal
    pub required: u32,
}

/// MOD13A1: SummaryQA bits 0-1, good data only
pub const VEGETATION_QA: QaRule = QaRule {
    band: "SummaryQA",
    bitmask: 0b11,
    required: 0,
};

/// MOD11A2 / MOD11A1: QC_Day bits 0-1, produced with good quality
pub const LST_QA: QaRule = QaRule {
    band: "QC_Day",
    bitmask: 0b11,
    required: 0,
};

/// MCD15A3H: FparLai_QC bit 0, good quality
pub const LAI_FPAR_QA: QaRule = QaRule {
    band: "FparLai_QC",
    bitmask: 0b01,
    required: 0,
};

/// MOD09A1: StateQA bit 0, clear
pub const REFLECTANCE_QA: QaRule = QaRule {
    band: "StateQA",
    bitmask: 0b01,
    required: 0,
};

impl QaRule {
    /// Whether a raw QA value passes. QA words are non-negative integers;
    /// anything else fails.
    pub fn passes(&self, qa: f64) -> bool {
        if !qa.is_finite() || qa < 0.0 || qa > u32::MAX as f64 || qa.fract() != 0.0 {
            return false;
        }
        (qa as u32) & self.bitmask == self.required
    }

    /// `true` where the QA cell exists and passes
    pub fn mask(&self, qa: &Raster<f64>) -> Array2<bool> {
        Array2::from_shape_fn(qa.shape(), |(row, col)| {
            qa.cell(row, col).is_some_and(|v| self.passes(v))
        })
    }

    pub fn apply(&self, image: &RasterImage) -> Result<RasterImage> {
        mask_quality(image, self.band, self.bitmask, self.required)
    }
}

/// Invalidate every pixel whose QA test fails, in every band.
///
/// The QA band itself is dropped from the output; timestamp and
/// properties are carried over. A missing QA band is an error.
pub fn mask_quality(
    image: &RasterImage,
    qa_band: &'static str,
    bitmask: u32,
    required: u32,
) -> Result<RasterImage> {
    let rule = QaRule {
        band: qa_band,
        bitmask,
        required,
    };
    let keep = rule.mask(image.band(qa_band)?);

    let mut masked = RasterImage::new(image.timestamp()).with_metadata_of(image);
    for band in image.bands().filter(|b| b.name != qa_band) {
        masked = masked.with_band(band.name.clone(), band.raster.masked(&keep)?)?;
    }
    Ok(masked)
}
