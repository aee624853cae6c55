//! Test data generators for synthetic CDI rasters.
//!
//! The strip raster covers the fixture country at 0.1 degree resolution so
//! every pixel centre falls strictly inside one strip.

use std::io::Cursor;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const STRIP_RASTER_WIDTH: u32 = 30;
pub const STRIP_RASTER_HEIGHT: u32 = 20;
pub const STRIP_PIXEL_SIZE: f64 = 0.1;
/// Upper-left corner of the strip raster.
pub const STRIP_ORIGIN: (f64, f64) = (0.0, 2.0);

/// Per-strip CDI values, west to east.
pub const STRIP_VALUES: [f32; 3] = [0.01, 0.15, 0.5];

pub const NODATA: f32 = -9999.0;

/// Row-major strip raster data, one constant value per strip.
pub fn strip_raster_data() -> Vec<f32> {
    create_grid(STRIP_RASTER_WIDTH as usize, STRIP_RASTER_HEIGHT as usize, |col, _| {
        STRIP_VALUES[col / 10]
    })
}

/// Creates a row-major grid from a `(col, row)` function.
pub fn create_grid(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(f(col, row));
        }
    }
    data
}

/// Georeferencing for [`geotiff_bytes`].
#[derive(Debug, Clone, Copy)]
pub struct GeoSpec {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_size: f64,
    pub nodata: Option<f32>,
}

impl GeoSpec {
    pub fn strips() -> Self {
        Self {
            origin_x: STRIP_ORIGIN.0,
            origin_y: STRIP_ORIGIN.1,
            pixel_size: STRIP_PIXEL_SIZE,
            nodata: Some(NODATA),
        }
    }
}

/// Encode a single-band float GeoTIFF in memory.
pub fn geotiff_bytes(width: u32, height: u32, data: &[f32], geo: GeoSpec) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).expect("tiff encoder");
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(width, height)
            .expect("tiff image");
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(33550),
                &[geo.pixel_size, geo.pixel_size, 0.0][..],
            )
            .expect("pixel scale tag");
        image
            .encoder()
            .write_tag(
                Tag::from_u16_exhaustive(33922),
                &[0.0, 0.0, 0.0, geo.origin_x, geo.origin_y, 0.0][..],
            )
            .expect("tiepoint tag");
        if let Some(nodata) = geo.nodata {
            let text = format!("{}", nodata);
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(42113), text.as_str())
                .expect("nodata tag");
        }
        image.write_data(data).expect("tiff data");
    }
    cursor.into_inner()
}

/// Write the strip raster GeoTIFF to `path`.
pub fn write_strip_geotiff(path: &Path) -> std::io::Result<()> {
    let bytes = geotiff_bytes(
        STRIP_RASTER_WIDTH,
        STRIP_RASTER_HEIGHT,
        &strip_raster_data(),
        GeoSpec::strips(),
    );
    std::fs::write(path, bytes)
}
