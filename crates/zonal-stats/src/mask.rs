//! Pixel selection per polygon.

use crate::raster::Raster;
use cdi_common::MultiPolygon;

/// Values of the valid pixels selected by `geometry`.
///
/// A pixel is selected when its centre lies inside the geometry. With
/// `all_touched`, any pixel whose cell touches the geometry is selected.
pub fn masked_values(raster: &Raster, geometry: &MultiPolygon, all_touched: bool) -> Vec<f64> {
    let Some(bbox) = geometry.bbox() else {
        return Vec::new();
    };
    let Some(window) = raster.window(&bbox) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for row in window.row_start..window.row_end {
        for col in window.col_start..window.col_end {
            let selected = if all_touched {
                geometry.intersects_rect(&raster.cell_rect(col, row))
            } else {
                let (x, y) = raster.pixel_center(col, row);
                geometry.contains_point(x, y)
            };
            if !selected {
                continue;
            }
            let v = raster.value(col, row);
            if raster.is_valid(v) {
                out.push(v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use cdi_common::{Polygon, Ring};

    fn unit_raster() -> Raster {
        // 4x4 pixels of size 1 over [0,4]x[0,4], value = col + 10 * row
        let data = (0..16).map(|i| (i % 4) as f64 + 10.0 * (i / 4) as f64).collect();
        Raster::new(4, 4, GeoTransform::new(0.0, 4.0, 1.0, -1.0), None, data).unwrap()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon {
        Polygon::new(Ring::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]), vec![]).into()
    }

    #[test]
    fn test_center_rule() {
        // Covers centres of cols 0-1 in the top row only
        let values = masked_values(&unit_raster(), &rect(0.0, 3.2, 1.8, 4.0), false);
        assert_eq!(values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_all_touched_selects_more() {
        // Thin sliver that misses every centre
        let geom = rect(1.1, 3.1, 1.3, 3.3);
        assert!(masked_values(&unit_raster(), &geom, false).is_empty());
        assert_eq!(masked_values(&unit_raster(), &geom, true), vec![1.0]);
    }

    #[test]
    fn test_outside_raster() {
        assert!(masked_values(&unit_raster(), &rect(10.0, 10.0, 11.0, 11.0), false).is_empty());
    }
}
