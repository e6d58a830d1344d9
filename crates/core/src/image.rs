//! Timestamped multi-band images
//!
//! A [`RasterImage`] is a set of named `f64` bands on one shared grid,
//! tagged with an acquisition time and free-form properties (`year`,
//! `compositeStart`, ...). Images are never mutated by the pipeline:
//! every transform builds a new one.

use crate::error::{Error, Result};
use crate::raster::{Grid, Raster};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property key holding the composite year
pub const PROP_YEAR: &str = "year";
/// Property key holding the first day of the composite season
pub const PROP_COMPOSITE_START: &str = "compositeStart";

/// Property value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    String(String),
    Time(DateTime<Utc>),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::Time(t) => Some(*t),
            _ => None,
        }
    }
}

/// A named band of an image
#[derive(Debug, Clone)]
pub struct NamedBand {
    pub name: String,
    pub raster: Raster<f64>,
}

/// An immutable multi-band raster with acquisition time and properties.
#[derive(Debug, Clone)]
pub struct RasterImage {
    bands: Vec<NamedBand>,
    timestamp: DateTime<Utc>,
    properties: BTreeMap<String, PropertyValue>,
}

impl RasterImage {
    /// Create an image with no bands
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            bands: Vec::new(),
            timestamp,
            properties: BTreeMap::new(),
        }
    }

    /// Create a single-band image
    pub fn from_band(name: impl Into<String>, raster: Raster<f64>, timestamp: DateTime<Utc>) -> Self {
        Self {
            bands: vec![NamedBand {
                name: name.into(),
                raster,
            }],
            timestamp,
            properties: BTreeMap::new(),
        }
    }

    /// Append a band. It must be co-registered with the bands already present
    /// and its name must be new.
    pub fn with_band(mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<Self> {
        let name = name.into();
        if self.has_band(&name) {
            return Err(Error::SchemaMismatch(format!(
                "duplicate band '{}' in {}",
                name,
                self.describe()
            )));
        }
        if let Some(first) = self.bands.first() {
            first
                .raster
                .grid()
                .ensure_matches(&raster.grid(), &format!("band '{}' of {}", name, self.describe()))?;
        }
        self.bands.push(NamedBand { name, raster });
        Ok(self)
    }

    /// Set a property, returning the updated image
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Copy timestamp and properties from `other`
    pub fn with_metadata_of(mut self, other: &RasterImage) -> Self {
        self.timestamp = other.timestamp;
        self.properties = other.properties.clone();
        self
    }

    // Time

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Calendar year of acquisition
    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    /// Calendar month of acquisition (1-12)
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    // Bands

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn bands(&self) -> impl Iterator<Item = &NamedBand> {
        self.bands.iter()
    }

    pub fn into_bands(self) -> Vec<NamedBand> {
        self.bands
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|b| b.name == name)
    }

    /// Look up a band by name, failing with [`Error::MissingBand`]
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.bands
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.raster)
            .ok_or_else(|| Error::MissingBand {
                band: name.to_string(),
                context: self.describe(),
            })
    }

    /// New image holding only `names`, in the given order
    pub fn select(&self, names: &[&str]) -> Result<RasterImage> {
        let mut bands = Vec::with_capacity(names.len());
        for &name in names {
            bands.push(NamedBand {
                name: name.to_string(),
                raster: self.band(name)?.clone(),
            });
        }
        Ok(RasterImage {
            bands,
            timestamp: self.timestamp,
            properties: self.properties.clone(),
        })
    }

    /// The grid shared by all bands, `None` for an image without bands
    pub fn grid(&self) -> Option<Grid> {
        self.bands.first().map(|b| b.raster.grid())
    }

    // Properties

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    /// The `year` property, if set
    pub fn year_property(&self) -> Option<i32> {
        self.property(PROP_YEAR)
            .and_then(PropertyValue::as_int)
            .and_then(|y| i32::try_from(y).ok())
    }

    fn describe(&self) -> String {
        format!("image at {}", self.timestamp.format("%Y-%m-%d"))
    }
}
