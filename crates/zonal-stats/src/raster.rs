//! In-memory single-band raster with an affine north-up geotransform.
//!
//! The zonal pipeline only ever needs one band of category codes, so a
//! raster is a flat row-major `Vec<f64>` plus the transform that places it
//! on the map. Pixel geometry helpers here are what the coverage and
//! statistics passes use to decide which cells belong to a region:
//!
//! - [`Raster::pixel_center`] for centre-point inclusion
//! - [`Raster::cell_rect`] for the all-touched test
//! - [`Raster::window`] to limit work to a region's bounding box

use crate::error::{ZonalError, ZonalResult};
use cdi_common::BoundingBox;

/// Maps pixel `(col, row)` corners to map coordinates.
///
/// `x = origin_x + col * pixel_width`, `y = origin_y + row * pixel_height`.
/// North-up rasters have a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }
}

/// Pixel index range `[col_start, col_end) × [row_start, row_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub col_start: usize,
    pub col_end: usize,
    pub row_start: usize,
    pub row_end: usize,
}

impl PixelWindow {
    pub fn is_empty(&self) -> bool {
        self.col_start >= self.col_end || self.row_start >= self.row_end
    }
}

#[derive(Debug, Clone)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    /// Row-major values, row 0 at `origin_y`.
    pub data: Vec<f64>,
}

impl Raster {
    /// Build a raster from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns [`ZonalError::InvalidShape`] when the raster is empty or
    /// `data` does not hold `width * height` samples, and
    /// [`ZonalError::InvalidGeoreference`] when either pixel size is zero.
    pub fn new(
        width: usize,
        height: usize,
        transform: GeoTransform,
        nodata: Option<f64>,
        data: Vec<f64>,
    ) -> ZonalResult<Self> {
        if width == 0 || height == 0 {
            return Err(ZonalError::InvalidShape("raster has no pixels".into()));
        }
        if data.len() != width * height {
            return Err(ZonalError::InvalidShape(format!(
                "expected {} values for {}x{}, got {}",
                width * height,
                width,
                height,
                data.len()
            )));
        }
        if transform.pixel_width == 0.0 || transform.pixel_height == 0.0 {
            return Err(ZonalError::InvalidGeoreference("pixel size is zero".into()));
        }
        Ok(Self {
            width,
            height,
            transform,
            nodata,
            data,
        })
    }

    pub fn value(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.width + col]
    }

    /// Whether a sample counts toward statistics.
    pub fn is_valid(&self, v: f64) -> bool {
        !v.is_nan() && self.nodata.map_or(true, |nd| v != nd)
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let t = &self.transform;
        (
            t.origin_x + (col as f64 + 0.5) * t.pixel_width,
            t.origin_y + (row as f64 + 0.5) * t.pixel_height,
        )
    }

    /// Map-space rectangle covered by one pixel.
    pub fn cell_rect(&self, col: usize, row: usize) -> BoundingBox {
        let t = &self.transform;
        let x0 = t.origin_x + col as f64 * t.pixel_width;
        let x1 = x0 + t.pixel_width;
        let y0 = t.origin_y + row as f64 * t.pixel_height;
        let y1 = y0 + t.pixel_height;
        BoundingBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    pub fn bbox(&self) -> BoundingBox {
        let t = &self.transform;
        let x1 = t.origin_x + self.width as f64 * t.pixel_width;
        let y1 = t.origin_y + self.height as f64 * t.pixel_height;
        BoundingBox::new(
            t.origin_x.min(x1),
            t.origin_y.min(y1),
            t.origin_x.max(x1),
            t.origin_y.max(y1),
        )
    }

    /// Pixels overlapping `bbox`, clamped to the raster.
    ///
    /// # Arguments
    ///
    /// * `bbox` - map-space rectangle, usually a region's bounding box
    ///
    /// # Returns
    ///
    /// `None` when the rectangle misses the raster entirely.
    pub fn window(&self, bbox: &BoundingBox) -> Option<PixelWindow> {
        let t = &self.transform;
        let cols = [
            (bbox.min_x - t.origin_x) / t.pixel_width,
            (bbox.max_x - t.origin_x) / t.pixel_width,
        ];
        let rows = [
            (bbox.min_y - t.origin_y) / t.pixel_height,
            (bbox.max_y - t.origin_y) / t.pixel_height,
        ];

        let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
        let window = PixelWindow {
            col_start: clamp(cols[0].min(cols[1]).floor(), self.width),
            col_end: clamp(cols[0].max(cols[1]).ceil(), self.width),
            row_start: clamp(rows[0].min(rows[1]).floor(), self.height),
            row_end: clamp(rows[0].max(rows[1]).ceil(), self.height),
        };
        (!window.is_empty()).then_some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_4x2() -> Raster {
        Raster::new(
            4,
            2,
            GeoTransform::new(10.0, 20.0, 0.5, -0.5),
            Some(-9999.0),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, -9999.0, f64::NAN],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_validation() {
        let t = GeoTransform::new(0.0, 0.0, 1.0, -1.0);
        assert!(Raster::new(2, 2, t, None, vec![0.0; 3]).is_err());
        assert!(Raster::new(0, 2, t, None, vec![]).is_err());
        let flat = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(Raster::new(1, 1, flat, None, vec![0.0]).is_err());
    }

    #[test]
    fn test_pixel_geometry() {
        let r = raster_4x2();
        assert_eq!(r.pixel_center(0, 0), (10.25, 19.75));
        assert_eq!(r.cell_rect(1, 1), BoundingBox::new(10.5, 19.0, 11.0, 19.5));
        assert_eq!(r.bbox(), BoundingBox::new(10.0, 19.0, 12.0, 20.0));
    }

    #[test]
    fn test_validity() {
        let r = raster_4x2();
        assert!(r.is_valid(r.value(0, 0)));
        assert!(!r.is_valid(r.value(2, 1)));
        assert!(!r.is_valid(r.value(3, 1)));
    }

    #[test]
    fn test_window_clamps() {
        let r = raster_4x2();
        let w = r.window(&BoundingBox::new(10.6, 19.6, 11.2, 25.0)).unwrap();
        assert_eq!(
            w,
            PixelWindow {
                col_start: 1,
                col_end: 3,
                row_start: 0,
                row_end: 1
            }
        );
        assert!(r.window(&BoundingBox::new(50.0, 50.0, 51.0, 51.0)).is_none());
    }
}
