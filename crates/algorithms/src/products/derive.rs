//! Per-image band algebra for DTR and NMDI

use crate::imagery::{diurnal_range, nmdi};
use kharif_core::{RasterImage, Result};

/// Single-band `DTR` image: scaled day LST minus scaled night LST
pub fn diurnal_range_image(image: &RasterImage) -> Result<RasterImage> {
    let dtr = diurnal_range(image.band("LST_Day_1km")?, image.band("LST_Night_1km")?)?;
    Ok(RasterImage::from_band("DTR", dtr, image.timestamp()).with_metadata_of(image))
}

/// Single-band `NMDI` image from scaled MOD09A1 reflectance
/// (b02 = NIR, b06 = SWIR1, b07 = SWIR2)
pub fn nmdi_image(image: &RasterImage) -> Result<RasterImage> {
    let index = nmdi(
        image.band("sur_refl_b02")?,
        image.band("sur_refl_b06")?,
        image.band("sur_refl_b07")?,
    )?;
    Ok(RasterImage::from_band("NMDI", index, image.timestamp()).with_metadata_of(image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use kharif_core::{Error, Raster};

    #[test]
    fn test_dtr_from_scaled_lst() {
        let t = Utc.with_ymd_and_hms(2015, 10, 3, 0, 0, 0).unwrap();
        let mut night = Raster::filled(2, 2, 12.35);
        night.invalidate(1, 1).unwrap();
        let image = RasterImage::from_band("LST_Day_1km", Raster::filled(2, 2, 30.85), t)
            .with_band("LST_Night_1km", night)
            .unwrap();

        let dtr = diurnal_range_image(&image).unwrap();
        assert_eq!(dtr.band_names(), vec!["DTR"]);
        assert_eq!(dtr.timestamp(), t);
        let band = dtr.band("DTR").unwrap();
        assert_relative_eq!(band.cell(0, 0).unwrap(), 18.5, epsilon = 1e-9);
        assert_eq!(band.cell(1, 1), None);
    }

    #[test]
    fn test_nmdi_image() {
        let t = Utc.with_ymd_and_hms(2015, 8, 21, 0, 0, 0).unwrap();
        let image = RasterImage::from_band("sur_refl_b02", Raster::filled(1, 2, 0.32), t)
            .with_band("sur_refl_b06", Raster::filled(1, 2, 0.24))
            .unwrap()
            .with_band("sur_refl_b07", Raster::filled(1, 2, 0.16))
            .unwrap();

        let out = nmdi_image(&image).unwrap();
        // (0.32 - 0.08) / (0.32 + 0.08)
        assert_relative_eq!(out.band("NMDI").unwrap().cell(0, 1).unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_missing_input_band() {
        let t = Utc.with_ymd_and_hms(2015, 8, 21, 0, 0, 0).unwrap();
        let image = RasterImage::from_band("LST_Day_1km", Raster::filled(1, 1, 20.0), t);
        assert!(matches!(
            diurnal_range_image(&image),
            Err(Error::MissingBand { .. })
        ));
    }
}
