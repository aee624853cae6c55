//! GeoJSON FeatureCollection export.

use cdi_common::{CdiResult, MultiPolygon, Ring};
use serde_json::{json, Value};

use crate::document::MapDocument;

fn ring_coordinates(ring: &Ring) -> Value {
    Value::Array(ring.points().iter().map(|p| json!([p[0], p[1]])).collect())
}

/// GeoJSON `MultiPolygon` geometry object.
pub fn geometry_json(geometry: &MultiPolygon) -> Value {
    let polygons: Vec<Value> = geometry
        .polygons()
        .iter()
        .map(|polygon| Value::Array(polygon.rings().map(ring_coordinates).collect()))
        .collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

pub fn feature_collection(doc: &MapDocument) -> Value {
    let features: Vec<Value> = doc
        .features
        .iter()
        .map(|f| {
            json!({
                "type": "Feature",
                "id": f.administration_id,
                "properties": {
                    "administration_id": f.administration_id,
                    "name": f.name,
                    "region": f.region,
                    "value": f.value,
                    "category": f.category,
                    "cat_name": f.cat_name(),
                },
                "geometry": geometry_json(&f.geometry),
            })
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "name": doc.file_stem(),
        "year_month": doc.year_month,
        "features": features,
    })
}

pub fn to_geojson_bytes(doc: &MapDocument) -> CdiResult<Vec<u8>> {
    Ok(serde_json::to_vec(&feature_collection(doc))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::{CategoryValue, DroughtCategory, YearMonth};
    use test_utils::strip_boundaries;

    #[test]
    fn test_feature_properties() {
        let doc = MapDocument::new(
            YearMonth::new(2025, 1).unwrap(),
            &strip_boundaries(),
            &[CategoryValue::new(3, Some(0.04), Some(DroughtCategory::D3))],
        );
        let fc = feature_collection(&doc);
        assert_eq!(fc["type"], "FeatureCollection");
        assert_eq!(fc["features"].as_array().unwrap().len(), 3);

        let third = &fc["features"][2];
        assert_eq!(third["properties"]["name"], "Lubombo");
        assert_eq!(third["properties"]["category"], 4);
        assert_eq!(third["properties"]["cat_name"], "Extreme Drought");
        assert_eq!(third["geometry"]["type"], "MultiPolygon");

        let ring = third["geometry"]["coordinates"][0][0].as_array().unwrap();
        assert_eq!(ring.first(), ring.last());

        let first = &fc["features"][0];
        assert_eq!(first["properties"]["category"], 0);
        assert!(first["properties"]["value"].is_null());
    }
}
