//! Common test fixtures for CDI map tests.
//!
//! The fixture country is three vertical strips, each one degree wide and
//! two degrees tall, side by side from longitude 0 to 3 and latitude 0 to 2:
//!
//! | id | name    | region  | x range |
//! |----|---------|---------|---------|
//! | 1  | Hhohho  | North   | 0..1    |
//! | 2  | Manzini | Central | 1..2    |
//! | 3  | Lubombo | East    | 2..3    |

use cdi_common::{BoundarySet, CategoryValue, DroughtCategory};
use serde_json::{json, Value};

/// Administration ids in the fixture, west to east.
pub const STRIP_IDS: [i64; 3] = [1, 2, 3];

/// Quantized TopoJSON with shared arcs between neighbouring strips.
pub fn strips_topojson() -> Value {
    json!({
        "type": "Topology",
        "transform": {"scale": [0.5, 0.5], "translate": [0.0, 0.0]},
        "objects": {
            "admin": {
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Polygon", "arcs": [[0, 1, 2, 3]],
                     "properties": {"administration_id": 1, "name": "Hhohho", "region": "North"}},
                    {"type": "Polygon", "arcs": [[4, 5, 6, -3]],
                     "properties": {"administration_id": 2, "name": "Manzini", "region": "Central"}},
                    {"type": "Polygon", "arcs": [[7, 8, 9, -6]],
                     "properties": {"administration_id": "3", "name": "Lubombo", "region": "East"}}
                ]
            }
        },
        "arcs": [
            [[0, 4], [0, -4]],
            [[0, 0], [2, 0]],
            [[2, 0], [0, 4]],
            [[2, 4], [-2, 0]],
            [[2, 0], [2, 0]],
            [[4, 0], [0, 4]],
            [[4, 4], [-2, 0]],
            [[4, 0], [2, 0]],
            [[6, 0], [0, 4]],
            [[6, 4], [-2, 0]]
        ]
    })
}

/// The same three strips as a GeoJSON FeatureCollection.
pub fn strips_geojson() -> Value {
    let feature = |id: i64, name: &str, region: &str, x0: f64| {
        json!({
            "type": "Feature",
            "properties": {"administration_id": id, "name": name, "region": region},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[x0, 0.0], [x0 + 1.0, 0.0], [x0 + 1.0, 2.0], [x0, 2.0], [x0, 0.0]]]
            }
        })
    };
    json!({
        "type": "FeatureCollection",
        "features": [
            feature(1, "Hhohho", "North", 0.0),
            feature(2, "Manzini", "Central", 1.0),
            feature(3, "Lubombo", "East", 2.0),
        ]
    })
}

pub fn strip_boundaries() -> BoundarySet {
    BoundarySet::from_json_str(&strips_topojson().to_string())
        .unwrap_or_else(|e| panic!("fixture topology must parse: {}", e))
}

/// Values a zonal run over [`strip_raster`](crate::strip_raster) yields.
pub fn strip_initial_values() -> Vec<CategoryValue> {
    vec![
        CategoryValue::new(1, Some(0.01), Some(DroughtCategory::D4)),
        CategoryValue::new(2, Some(0.15), Some(DroughtCategory::D1)),
        CategoryValue::new(3, Some(0.5), Some(DroughtCategory::Normal)),
    ]
}
