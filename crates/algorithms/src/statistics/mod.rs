//! Statistics over exported stacks
//!
//! - **Zonal**: per-zone yearly means of product stacks, as long-format rows

mod zonal;

pub use zonal::{
    load_zones, write_zonal_csv, zonal_mean, zonal_means, zonal_table, ZonalRow, Zone, ZoneDef,
};
