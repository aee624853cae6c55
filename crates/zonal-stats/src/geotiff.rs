//! GeoTIFF decoding into a [`Raster`].
//!
//! Only band 1 is read. Georeferencing comes from ModelPixelScale plus
//! ModelTiepoint, or from a non-rotated ModelTransformation. Nodata comes
//! from the GDAL_NODATA ascii tag.

use crate::error::{ZonalError, ZonalResult};
use crate::raster::{GeoTransform, Raster};
use cdi_common::archive;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, instrument};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_RASTER_TYPE_KEY: u32 = 1025;
const RASTER_PIXEL_IS_POINT: u32 = 2;

/// Read a GeoTIFF file, or the first `.tif` inside a ZIP archive.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_geotiff_file(path: impl AsRef<Path>) -> ZonalResult<Raster> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| ZonalError::OpenFailed(format!("{}: {}", path.display(), e)))?;
    read_raster_bytes(bytes)
}

/// Decode raw download bytes that are either a GeoTIFF or a ZIP holding one.
pub fn read_raster_bytes(bytes: Vec<u8>) -> ZonalResult<Raster> {
    if archive::is_zip(&bytes) {
        let entry = archive::find_entry(&bytes, &[".tif", ".tiff"])
            .map_err(|e| ZonalError::OpenFailed(e.to_string()))?
            .ok_or_else(|| ZonalError::OpenFailed("archive contains no GeoTIFF".into()))?;
        debug!(entry = %entry.name, "Using GeoTIFF from archive");
        return read_geotiff(entry.data);
    }
    read_geotiff(bytes)
}

pub fn read_geotiff(bytes: Vec<u8>) -> ZonalResult<Raster> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let transform = read_transform(&mut decoder)?;
    let nodata = decoder
        .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let samples = widen(decoder.read_image()?)?;
    let pixels = width * height;
    if pixels == 0 || samples.len() % pixels != 0 {
        return Err(ZonalError::InvalidShape(format!(
            "{} samples do not fit {}x{}",
            samples.len(),
            width,
            height
        )));
    }
    let bands = samples.len() / pixels;
    let data = if bands == 1 {
        samples
    } else {
        samples.into_iter().step_by(bands).collect()
    };

    debug!(width, height, bands, ?nodata, "Decoded GeoTIFF");
    Raster::new(width, height, transform, nodata, data)
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> ZonalResult<GeoTransform> {
    let f64_tag = |decoder: &mut Decoder<R>, code: u16| {
        decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(code)).ok()
    };

    let mut transform = match (
        f64_tag(decoder, MODEL_PIXEL_SCALE),
        f64_tag(decoder, MODEL_TIEPOINT),
    ) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            let (sx, sy) = (scale[0], scale[1]);
            // Tiepoint maps raster (i, j) to model (x, y)
            GeoTransform::new(tie[3] - tie[0] * sx, tie[4] + tie[1] * sy, sx, -sy)
        }
        _ => match f64_tag(decoder, MODEL_TRANSFORMATION) {
            Some(m) if m.len() >= 16 => {
                if m[1] != 0.0 || m[4] != 0.0 {
                    return Err(ZonalError::InvalidGeoreference(
                        "rotated rasters are not supported".into(),
                    ));
                }
                GeoTransform::new(m[3], m[7], m[0], m[5])
            }
            _ => {
                return Err(ZonalError::InvalidGeoreference(
                    "missing ModelPixelScale/ModelTiepoint or ModelTransformation".into(),
                ))
            }
        },
    };

    if pixel_is_point(decoder) {
        transform.origin_x -= transform.pixel_width / 2.0;
        transform.origin_y -= transform.pixel_height / 2.0;
    }
    Ok(transform)
}

/// GTRasterTypeGeoKey says coordinates refer to pixel centres.
fn pixel_is_point<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> bool {
    let Ok(keys) = decoder.get_tag_u32_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)) else {
        return false;
    };
    // Header of four shorts, then (key, location, count, value) entries
    keys.get(4..)
        .unwrap_or_default()
        .chunks_exact(4)
        .any(|k| k[0] == GT_RASTER_TYPE_KEY && k[1] == 0 && k[3] == RASTER_PIXEL_IS_POINT)
}

fn widen(result: DecodingResult) -> ZonalResult<Vec<f64>> {
    Ok(match result {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => {
            return Err(ZonalError::DecodeFailed(
                "unsupported sample format".into(),
            ))
        }
    })
}
