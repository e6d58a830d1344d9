//! Imagery algorithms
//!
//! Per-image processing of satellite bands:
//! - Quality masking from QA bit fields
//! - Unit scaling of raw integer bands
//! - Band math: validity-aware raster algebra
//! - Indices: NMDI, diurnal temperature range, VCI/TCI/VHI

mod band_math;
mod indices;
mod quality;
mod scale;

pub use band_math::{band_math, band_math_binary, BandMathOp, DIVISION_EPSILON};
pub use indices::{
    diurnal_range, nmdi, temperature_condition, vegetation_condition, vegetation_health,
    VHI_ALPHA,
};
pub use quality::{
    mask_quality, QaRule, LAI_FPAR_QA, LST_QA, REFLECTANCE_QA, VEGETATION_QA,
};
pub use scale::{
    scale, ScaleRule, LAI_FPAR_SCALE, LST_SCALE, REFLECTANCE_SCALE, VEGETATION_SCALE,
};
