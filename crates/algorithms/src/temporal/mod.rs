//! Temporal algorithms
//!
//! - Season windows and year ranges
//! - Per-pixel reductions over image series
//! - Season-bounded yearly mean composites
//! - Nearest-time join between collections

mod aggregate;
mod join;
mod reduce;
mod season;

pub use aggregate::{yearly_mean, YearlyCompositor};
pub use join::{join_nearest, JoinedPair, DEFAULT_JOIN_TOLERANCE_DAYS};
pub use reduce::{reduce_series, Reducer};
pub use season::{Season, YearRange};
