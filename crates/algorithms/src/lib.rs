//! # Kharif Algorithms
//!
//! Seasonal composites of MODIS time series for the kharif (monsoon)
//! growing season.
//!
//! ## Modules
//!
//! - **imagery**: QA masking, unit scaling, band math, NMDI/DTR/VCI/TCI/VHI
//! - **temporal**: season windows, per-pixel reductions, yearly composites, time joins
//! - **products**: source collections, the seven derived products, year-ordered stacks
//! - **source**: where raw collections come from (directory tree, memory)
//! - **pipeline**: the end-to-end batch run
//! - **statistics**: zonal means of exported stacks

pub mod imagery;
pub mod pipeline;
pub mod products;
pub mod source;
pub mod statistics;
pub mod temporal;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        band_math, band_math_binary, diurnal_range, mask_quality, nmdi, scale,
        temperature_condition, vegetation_condition, vegetation_health, BandMathOp, QaRule,
        ScaleRule, VHI_ALPHA,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, ProductSet};
    pub use crate::products::{
        stack_composites, vhi, vhi_series, Product, RecordExtremes, SourceKind, VhiDeriver,
    };
    pub use crate::source::{CollectionSource, DirectorySource, MemorySource};
    pub use crate::statistics::{zonal_table, ZonalRow, Zone};
    pub use crate::temporal::{
        join_nearest, yearly_mean, JoinedPair, Reducer, Season, YearRange, YearlyCompositor,
    };
    pub use kharif_core::prelude::*;
}
