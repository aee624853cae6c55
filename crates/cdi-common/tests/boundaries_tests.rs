//! Boundary loading tests against the strip fixtures.

use cdi_common::{BoundarySet, BoundingBox};
use test_utils::{strips_geojson, strips_topojson, STRIP_IDS};

// ============================================================================
// TopoJSON
// ============================================================================

#[test]
fn test_topojson_loads_all_regions() {
    let set = BoundarySet::from_json_str(&strips_topojson().to_string()).unwrap();
    assert_eq!(set.len(), 3);
    let ids: Vec<i64> = set.iter().map(|b| b.administration_id).collect();
    assert_eq!(ids, STRIP_IDS.to_vec());
    assert_eq!(set.get(2).unwrap().name, "Manzini");
    assert_eq!(set.get(3).unwrap().region.as_deref(), Some("East"));
}

#[test]
fn test_topojson_dequantizes_arcs() {
    let set = BoundarySet::from_json_str(&strips_topojson().to_string()).unwrap();
    let middle = set.get(2).unwrap();
    assert_eq!(
        middle.geometry.bbox().unwrap(),
        BoundingBox::new(1.0, 0.0, 2.0, 2.0)
    );
    let ring = middle.geometry.polygons()[0].exterior.points();
    assert_eq!(ring.first(), ring.last());
    assert_eq!(ring.len(), 5);
}

#[test]
fn test_topojson_point_membership() {
    let set = BoundarySet::from_json_str(&strips_topojson().to_string()).unwrap();
    assert!(set.get(1).unwrap().geometry.contains_point(0.5, 1.0));
    assert!(!set.get(1).unwrap().geometry.contains_point(1.5, 1.0));
    assert!(set.get(3).unwrap().geometry.contains_point(2.9, 1.9));
}

#[test]
fn test_topojson_bad_arc_index() {
    let mut doc = strips_topojson();
    doc["objects"]["admin"]["geometries"][0]["arcs"] = serde_json::json!([[0, 42]]);
    assert!(BoundarySet::from_json_str(&doc.to_string()).is_err());
}

// ============================================================================
// GeoJSON
// ============================================================================

#[test]
fn test_geojson_matches_topojson() {
    let topo = BoundarySet::from_json_str(&strips_topojson().to_string()).unwrap();
    let geo = BoundarySet::from_json_str(&strips_geojson().to_string()).unwrap();
    assert_eq!(topo.len(), geo.len());
    for (a, b) in topo.iter().zip(geo.iter()) {
        assert_eq!(a.administration_id, b.administration_id);
        assert_eq!(a.geometry.bbox(), b.geometry.bbox());
    }
    assert_eq!(geo.bbox().unwrap(), BoundingBox::new(0.0, 0.0, 3.0, 2.0));
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eswatini.topojson");
    std::fs::write(&path, strips_topojson().to_string()).unwrap();
    let set = BoundarySet::load(&path).unwrap();
    assert_eq!(set.len(), 3);
    assert!(BoundarySet::load(dir.path().join("missing.json")).is_err());
}
