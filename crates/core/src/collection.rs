//! Ordered image collections

use crate::error::{Error, Result};
use crate::image::RasterImage;
use crate::raster::{Grid, Raster};
use chrono::{DateTime, Utc};

/// An ordered sequence of images from one source product.
///
/// Timestamps need not be evenly spaced. All images are expected to share
/// a band schema and a grid; [`RasterCollection::validate_schema`] checks both.
#[derive(Debug, Clone, Default)]
pub struct RasterCollection {
    name: String,
    images: Vec<RasterImage>,
}

impl RasterCollection {
    pub fn new(name: impl Into<String>, images: Vec<RasterImage>) -> Self {
        Self {
            name: name.into(),
            images,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, image: RasterImage) {
        self.images.push(image);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RasterImage> {
        self.images.iter()
    }

    pub fn images(&self) -> &[RasterImage] {
        &self.images
    }

    pub fn into_images(self) -> Vec<RasterImage> {
        self.images
    }

    /// Same images under a new name
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            images: self.images,
        }
    }

    /// Keep the images matching `pred`, preserving order
    pub fn filter<P>(&self, pred: P) -> RasterCollection
    where
        P: Fn(&RasterImage) -> bool,
    {
        RasterCollection {
            name: self.name.clone(),
            images: self.images.iter().filter(|img| pred(img)).cloned().collect(),
        }
    }

    /// Images acquired in calendar year `year`
    pub fn filter_year(&self, year: i32) -> RasterCollection {
        self.filter(|img| img.year() == year)
    }

    /// Images whose acquisition month lies in `[start_month, end_month]`
    pub fn filter_months(&self, start_month: u32, end_month: u32) -> RasterCollection {
        self.filter(|img| (start_month..=end_month).contains(&img.month()))
    }

    /// Images acquired in `[start, end]`
    pub fn filter_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> RasterCollection {
        self.filter(|img| img.timestamp() >= start && img.timestamp() <= end)
    }

    /// Earliest and latest acquisition time
    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.images.iter().map(|i| i.timestamp()).min()?;
        let last = self.images.iter().map(|i| i.timestamp()).max()?;
        Some((first, last))
    }

    /// Grid of the first image
    pub fn grid(&self) -> Option<Grid> {
        self.images.iter().find_map(|img| img.grid())
    }

    /// The `band` raster of every image, in collection order
    pub fn band_series(&self, band: &str) -> Result<Vec<&Raster<f64>>> {
        self.images.iter().map(|img| img.band(band)).collect()
    }

    /// Check that every image carries `required` bands and that all images
    /// share one grid. Either failure means downstream output would be wrong,
    /// so it is reported as a fatal schema error.
    pub fn validate_schema(&self, required: &[&str]) -> Result<()> {
        let reference = self.grid();
        for image in &self.images {
            for &band in required {
                if !image.has_band(band) {
                    return Err(Error::MissingBand {
                        band: band.to_string(),
                        context: format!(
                            "collection {} (image at {})",
                            self.name,
                            image.timestamp().format("%Y-%m-%d")
                        ),
                    });
                }
            }
            if let (Some(reference), Some(grid)) = (&reference, image.grid()) {
                reference.ensure_matches(&grid, &format!("collection {}", self.name))?;
            }
        }
        Ok(())
    }
}

impl IntoIterator for RasterCollection {
    type Item = RasterImage;
    type IntoIter = std::vec::IntoIter<RasterImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.into_iter()
    }
}

impl FromIterator<RasterImage> for RasterCollection {
    fn from_iter<I: IntoIterator<Item = RasterImage>>(iter: I) -> Self {
        Self::new(String::new(), iter.into_iter().collect())
    }
}
