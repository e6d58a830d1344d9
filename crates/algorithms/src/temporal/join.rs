//! Nearest-time join of two independently sampled collections

use chrono::{DateTime, Duration, Utc};
use kharif_core::{RasterCollection, RasterImage};
use tracing::debug;

/// Default join tolerance, in days
pub const DEFAULT_JOIN_TOLERANCE_DAYS: i64 = 8;

/// A primary image and its nearest-in-time secondary
#[derive(Debug, Clone, Copy)]
pub struct JoinedPair<'a> {
    pub primary: &'a RasterImage,
    pub secondary: &'a RasterImage,
}

impl JoinedPair<'_> {
    /// Absolute time between the two acquisitions
    pub fn delta(&self) -> Duration {
        distance(self.primary.timestamp(), self.secondary.timestamp())
    }
}

fn distance(a: DateTime<Utc>, b: DateTime<Utc>) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

/// Pair each primary image with its nearest secondary image.
///
/// Ties go to the earlier secondary. A pair is kept only when the gap is
/// at most `max_delta`; unmatched primaries are dropped. Output follows
/// primary order, with at most one pair per primary.
pub fn join_nearest<'a>(
    primary: &'a RasterCollection,
    secondary: &'a RasterCollection,
    max_delta: Duration,
) -> Vec<JoinedPair<'a>> {
    let pairs: Vec<JoinedPair<'a>> = primary
        .iter()
        .filter_map(|p| {
            let nearest = secondary
                .iter()
                .min_by_key(|s| (distance(p.timestamp(), s.timestamp()), s.timestamp()))?;
            let pair = JoinedPair {
                primary: p,
                secondary: nearest,
            };
            (pair.delta() <= max_delta).then_some(pair)
        })
        .collect();

    let unmatched = primary.len() - pairs.len();
    if unmatched > 0 {
        debug!(
            primary = primary.name(),
            secondary = secondary.name(),
            unmatched,
            "primary images without a secondary within tolerance"
        );
    }
    pairs
}
