//! Native GeoTIFF reading/writing via the `tiff` crate
//!
//! Supports single-band pages with the ModelPixelScale / ModelTiepoint
//! georeferencing tags and a minimal GeoKey directory. Multi-band stacks
//! are written as one page per band.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_MODEL_TYPE: u32 = 1024;
const KEY_RASTER_TYPE: u32 = 1025;
const KEY_GEOGRAPHIC_TYPE: u32 = 2048;
const KEY_PROJECTED_TYPE: u32 = 3072;

/// Read the first page of a GeoTIFF file into a Raster
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<Raster<f64>> {
    let file = File::open(path.as_ref())?;
    let mut pages = decode_pages(BufReader::new(file), Some(1))?;
    pages
        .pop()
        .ok_or_else(|| Error::Other(format!("{}: no image pages", path.as_ref().display())))
}

/// Read every page of a GeoTIFF file, one raster per page
pub fn read_geotiff_pages<P: AsRef<Path>>(path: P) -> Result<Vec<Raster<f64>>> {
    let file = File::open(path.as_ref())?;
    decode_pages(BufReader::new(file), None)
}

/// Read the first page of an in-memory GeoTIFF
pub fn read_geotiff_from_buffer(data: &[u8]) -> Result<Raster<f64>> {
    let mut pages = decode_pages(Cursor::new(data), Some(1))?;
    pages
        .pop()
        .ok_or_else(|| Error::Other("buffer holds no image pages".into()))
}

fn tiff_err(what: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{}: {}", what, e))
}

/// Decode up to `limit` pages from any `Read + Seek` source
fn decode_pages<R>(reader: R, limit: Option<usize>) -> Result<Vec<Raster<f64>>>
where
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;
    let mut pages = Vec::new();

    loop {
        pages.push(decode_page(&mut decoder)?);

        if limit.is_some_and(|n| pages.len() >= n) || !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(tiff_err("Cannot advance to next page"))?;
    }

    Ok(pages)
}

fn decode_page<R>(decoder: &mut Decoder<R>) -> Result<Raster<f64>>
where
    R: std::io::Read + std::io::Seek,
{
    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let rows = height as usize;
    let cols = width as usize;

    let nodata = read_nodata(decoder);
    let result = decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?;

    let values: Vec<Option<f64>> = match result {
        DecodingResult::F32(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::F64(buf) => buf.iter().map(|&v| Some(v)).collect(),
        DecodingResult::U8(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::U16(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::U32(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::I8(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::I16(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        DecodingResult::I32(buf) => buf.iter().map(|&v| num_traits::cast(v)).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if values.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let is_nodata = |v: f64| v.is_nan() || nodata.is_some_and(|nd| v == nd);
    let valid: Vec<bool> = values
        .iter()
        .map(|v| v.is_some_and(|v| !is_nodata(v)))
        .collect();
    let data: Vec<f64> = values
        .into_iter()
        .zip(valid.iter())
        .map(|(v, &ok)| if ok { v.unwrap_or(0.0) } else { 0.0 })
        .collect();

    let mut raster = Raster::from_parts(to_array(data, rows, cols)?, to_array(valid, rows, cols)?)?;

    if let Some(transform) = read_geotransform(decoder) {
        raster.set_transform(transform);
    }
    if let Some(crs) = read_crs(decoder) {
        raster.set_crs(crs);
    }

    Ok(raster)
}

fn to_array<T>(values: Vec<T>, rows: usize, cols: usize) -> Result<Array2<T>> {
    Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Other(e.to_string()))
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()?;
    text.trim_matches(char::from(0)).trim().parse::<f64>().ok()
}

/// GeoTransform from ModelPixelScaleTag + ModelTiepointTag
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
        .ok()?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
        .ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// EPSG code from the GeoKey directory, if one is declared
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u32_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY))
        .ok()?;

    // Header is 4 shorts, then 4 shorts per key: id, location, count, value
    keys.get(4..)?
        .chunks_exact(4)
        .find(|k| (k[0] == KEY_GEOGRAPHIC_TYPE || k[0] == KEY_PROJECTED_TYPE) && k[1] == 0)
        .map(|k| CRS::from_epsg(k[3]))
}

/// Write a single raster as a one-page GeoTIFF
pub fn write_geotiff<P: AsRef<Path>>(raster: &Raster<f64>, path: P) -> Result<()> {
    write_geotiff_pages(&[raster], path)
}

/// Write rasters as consecutive pages of one GeoTIFF file.
///
/// Pages are written as 32-bit float with no-data cells encoded as NaN.
pub fn write_geotiff_pages<P: AsRef<Path>>(pages: &[&Raster<f64>], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_pages(pages, BufWriter::new(file))
}

/// Write rasters to an in-memory multi-page GeoTIFF buffer
pub fn write_geotiff_to_buffer(pages: &[&Raster<f64>]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_pages(pages, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_pages<W>(pages: &[&Raster<f64>], writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;

    for raster in pages {
        let (rows, cols) = raster.shape();
        let data: Vec<f32> = raster
            .data()
            .iter()
            .zip(raster.valid_mask().iter())
            .map(|(&v, &ok)| if ok { v as f32 } else { f32::NAN })
            .collect();

        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(tiff_err("Cannot create TIFF image"))?;

        let gt = raster.transform();
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_MODEL_PIXEL_SCALE), &scale[..])
            .map_err(tiff_err("Cannot write scale tag"))?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_MODEL_TIEPOINT), &tiepoint[..])
            .map_err(tiff_err("Cannot write tiepoint tag"))?;

        let geokeys = geo_key_directory(raster.crs());
        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GEO_KEY_DIRECTORY), &geokeys[..])
            .map_err(tiff_err("Cannot write geokey tag"))?;

        image
            .encoder()
            .write_tag(Tag::Unknown(TAG_GDAL_NODATA), "nan")
            .map_err(tiff_err("Cannot write nodata tag"))?;

        image
            .write_data(&data)
            .map_err(tiff_err("Cannot write image data"))?;
    }

    Ok(())
}

/// Minimal GeoKey directory: model type, raster type (PixelIsArea) and
/// the EPSG code when it fits in a short.
fn geo_key_directory(crs: &CRS) -> Vec<u16> {
    let epsg = crs.epsg().and_then(|c| u16::try_from(c).ok());
    let geographic = crs.is_geographic();

    let mut keys: Vec<[u16; 4]> = vec![
        [KEY_MODEL_TYPE as u16, 0, 1, if geographic { 2 } else { 1 }],
        [KEY_RASTER_TYPE as u16, 0, 1, 1],
    ];
    if let Some(code) = epsg {
        let key = if geographic {
            KEY_GEOGRAPHIC_TYPE
        } else {
            KEY_PROJECTED_TYPE
        };
        keys.push([key as u16, 0, 1, code]);
    }

    let mut out = vec![1, 1, 0, keys.len() as u16];
    out.extend(keys.iter().flatten());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Grid;

    #[test]
    fn test_buffer_roundtrip_preserves_validity_and_georef() {
        let grid = Grid::new(3, 2, GeoTransform::new(70.0, 30.0, 0.5, -0.5), CRS::wgs84());
        let mut raster = Raster::filled(3, 2, 0.25).on_grid(&grid);
        raster.invalidate(1, 1).unwrap();

        let buf = write_geotiff_to_buffer(&[&raster]).unwrap();
        let back = read_geotiff_from_buffer(&buf).unwrap();

        assert_eq!(back.shape(), (3, 2));
        assert_eq!(back.cell(0, 0), Some(0.25));
        assert_eq!(back.cell(1, 1), None);
        assert!(back.grid().is_aligned_with(&grid));
    }

    #[test]
    fn test_multi_page_roundtrip() {
        let a = Raster::filled(2, 2, 1.0);
        let b = Raster::filled(2, 2, 2.0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.tif");

        write_geotiff_pages(&[&a, &b], &path).unwrap();
        let pages = read_geotiff_pages(&path).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].cell(1, 1), Some(1.0));
        assert_eq!(pages[1].cell(1, 1), Some(2.0));
        assert_eq!(read_geotiff(&path).unwrap().cell(0, 0), Some(1.0));
    }

    #[test]
    fn test_geokeys_for_wgs84() {
        let keys = geo_key_directory(&CRS::wgs84());
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert!(keys.chunks(4).any(|k| k == [2048, 0, 1, 4326]));
    }
}
