//! # Kharif Parallel
//!
//! Execution strategies for kharif raster work.
//!
//! This crate provides:
//! - `ProcessingMode`: bind a run to the global pool, a sized pool or one thread
//! - Tiled processing for per-pixel reductions over large grids

pub mod strategy;
pub mod tiled;

pub use strategy::{num_cpus, ProcessingMode};
pub use tiled::{Tile, TileIterator, TiledProcessor};
