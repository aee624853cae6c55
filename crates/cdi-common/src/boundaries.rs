//! Administrative boundary loading from GeoJSON or TopoJSON.
//!
//! Every feature must carry `administration_id` and `name` properties;
//! `region` is optional. Non-polygonal features are skipped.

use crate::bbox::BoundingBox;
use crate::error::{CdiError, CdiResult};
use crate::geometry::{MultiPolygon, Polygon, Ring};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// One administrative region with its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminBoundary {
    pub administration_id: i64,
    pub name: String,
    pub region: Option<String>,
    pub geometry: MultiPolygon,
}

/// All boundaries used for zonal statistics and map exports.
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    boundaries: Vec<AdminBoundary>,
}

impl BoundarySet {
    pub fn new(mut boundaries: Vec<AdminBoundary>) -> Self {
        boundaries.sort_by_key(|b| b.administration_id);
        Self { boundaries }
    }

    /// Load a `.geojson`/`.json`/`.topojson` file, detecting the format from its content.
    pub fn load(path: impl AsRef<Path>) -> CdiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CdiError::BoundaryError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let set = Self::from_json_str(&text)?;
        debug!(path = %path.display(), count = set.len(), "Loaded administrative boundaries");
        Ok(set)
    }

    pub fn from_json_str(text: &str) -> CdiResult<Self> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| CdiError::BoundaryError(format!("invalid JSON: {}", e)))?;
        match doc.get("type").and_then(Value::as_str) {
            Some("Topology") => parse_topology(&doc).map(Self::new),
            Some("FeatureCollection") => parse_feature_collection(&doc).map(Self::new),
            other => Err(CdiError::BoundaryError(format!(
                "expected a Topology or FeatureCollection, got {:?}",
                other
            ))),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AdminBoundary> {
        self.boundaries.iter()
    }

    pub fn as_slice(&self) -> &[AdminBoundary] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }

    pub fn get(&self, administration_id: i64) -> Option<&AdminBoundary> {
        self.boundaries
            .binary_search_by_key(&administration_id, |b| b.administration_id)
            .ok()
            .map(|idx| &self.boundaries[idx])
    }

    /// Union bounding box of all boundaries.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.boundaries
            .iter()
            .filter_map(|b| b.geometry.bbox())
            .reduce(|a, b| a.union(&b))
    }
}

impl<'a> IntoIterator for &'a BoundarySet {
    type Item = &'a AdminBoundary;
    type IntoIter = std::slice::Iter<'a, AdminBoundary>;

    fn into_iter(self) -> Self::IntoIter {
        self.boundaries.iter()
    }
}

// ============================================================================
// Properties
// ============================================================================

fn boundary_from_properties(
    props: Option<&Map<String, Value>>,
    geometry: MultiPolygon,
) -> CdiResult<AdminBoundary> {
    let props = props.ok_or_else(|| CdiError::BoundaryError("feature has no properties".into()))?;

    let raw_id = props
        .get("administration_id")
        .or_else(|| props.get("id"))
        .ok_or_else(|| CdiError::BoundaryError("feature has no administration_id".into()))?;
    let administration_id = match raw_id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| CdiError::BoundaryError(format!("invalid administration_id {}", raw_id)))?;

    let name = props
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CdiError::BoundaryError(format!("administration {} has no name", administration_id))
        })?
        .to_string();
    let region = props.get("region").and_then(Value::as_str).map(str::to_string);

    Ok(AdminBoundary {
        administration_id,
        name,
        region,
        geometry,
    })
}

// ============================================================================
// GeoJSON
// ============================================================================

fn parse_feature_collection(doc: &Value) -> CdiResult<Vec<AdminBoundary>> {
    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| CdiError::BoundaryError("FeatureCollection has no features".into()))?;

    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        let geometry = match feature.get("geometry").map(parse_geojson_geometry) {
            Some(Ok(Some(g))) => g,
            Some(Err(e)) => return Err(e),
            _ => {
                warn!(properties = ?feature.get("properties"), "Skipping non-polygonal feature");
                continue;
            }
        };
        out.push(boundary_from_properties(
            feature.get("properties").and_then(Value::as_object),
            geometry,
        )?);
    }
    Ok(out)
}

fn parse_geojson_geometry(geom: &Value) -> CdiResult<Option<MultiPolygon>> {
    let coords = geom.get("coordinates");
    match (geom.get("type").and_then(Value::as_str), coords) {
        (Some("Polygon"), Some(c)) => Ok(Some(MultiPolygon(vec![parse_polygon_coords(c)?]))),
        (Some("MultiPolygon"), Some(c)) => {
            let parts = c
                .as_array()
                .ok_or_else(|| CdiError::BoundaryError("MultiPolygon coordinates must be a list".into()))?;
            let polys = parts
                .iter()
                .map(parse_polygon_coords)
                .collect::<CdiResult<Vec<_>>>()?;
            Ok(Some(MultiPolygon(polys)))
        }
        _ => Ok(None),
    }
}

fn parse_polygon_coords(value: &Value) -> CdiResult<Polygon> {
    let rings = value
        .as_array()
        .ok_or_else(|| CdiError::BoundaryError("polygon coordinates must be a list of rings".into()))?;
    let mut rings = rings.iter().map(parse_ring_coords);
    let exterior = rings
        .next()
        .ok_or_else(|| CdiError::BoundaryError("polygon has no exterior ring".into()))??;
    let holes = rings.collect::<CdiResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn parse_ring_coords(value: &Value) -> CdiResult<Ring> {
    let points = value
        .as_array()
        .ok_or_else(|| CdiError::BoundaryError("ring must be a list of positions".into()))?;
    points
        .iter()
        .map(parse_position)
        .collect::<CdiResult<Vec<_>>>()
        .map(Ring::new)
}

fn parse_position(value: &Value) -> CdiResult<[f64; 2]> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y, ..]) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => Ok([x, y]),
            _ => Err(CdiError::BoundaryError(format!("invalid position {}", value))),
        },
        _ => Err(CdiError::BoundaryError(format!("invalid position {}", value))),
    }
}

// ============================================================================
// TopoJSON
// ============================================================================

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<TopoTransform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: HashMap<String, TopoGeometry>,
}

#[derive(Debug, Deserialize)]
struct TopoTransform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct TopoGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    arcs: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometries: Vec<TopoGeometry>,
}

fn parse_topology(doc: &Value) -> CdiResult<Vec<AdminBoundary>> {
    let topo: Topology = serde_json::from_value(doc.clone())
        .map_err(|e| CdiError::BoundaryError(format!("invalid topology: {}", e)))?;
    let arcs = decode_arcs(&topo)?;

    // Object order in the file is not preserved by the map; sort by name for stable output
    let mut names: Vec<&String> = topo.objects.keys().collect();
    names.sort();

    let mut out = Vec::new();
    for name in names {
        collect_topo_geometry(&topo.objects[name], &arcs, &mut out)?;
    }
    Ok(out)
}

fn collect_topo_geometry(
    geom: &TopoGeometry,
    arcs: &[Vec<[f64; 2]>],
    out: &mut Vec<AdminBoundary>,
) -> CdiResult<()> {
    let multi = match (geom.kind.as_str(), geom.arcs.as_ref()) {
        ("GeometryCollection", _) => {
            for child in &geom.geometries {
                collect_topo_geometry(child, arcs, out)?;
            }
            return Ok(());
        }
        ("Polygon", Some(a)) => MultiPolygon(vec![topo_polygon(a, arcs)?]),
        ("MultiPolygon", Some(a)) => {
            let parts = a
                .as_array()
                .ok_or_else(|| CdiError::BoundaryError("MultiPolygon arcs must be a list".into()))?;
            MultiPolygon(
                parts
                    .iter()
                    .map(|p| topo_polygon(p, arcs))
                    .collect::<CdiResult<Vec<_>>>()?,
            )
        }
        (kind, _) => {
            warn!(kind, properties = ?geom.properties, "Skipping non-polygonal topology geometry");
            return Ok(());
        }
    };
    out.push(boundary_from_properties(geom.properties.as_ref(), multi)?);
    Ok(())
}

/// Convert quantized, delta-encoded arcs to absolute coordinates.
fn decode_arcs(topo: &Topology) -> CdiResult<Vec<Vec<[f64; 2]>>> {
    topo.arcs
        .iter()
        .map(|arc| {
            let mut x = 0.0;
            let mut y = 0.0;
            arc.iter()
                .map(|pos| {
                    let (px, py) = match pos.as_slice() {
                        [px, py, ..] => (*px, *py),
                        _ => return Err(CdiError::BoundaryError("arc position needs two values".into())),
                    };
                    Ok(match &topo.transform {
                        Some(t) => {
                            x += px;
                            y += py;
                            [x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1]]
                        }
                        None => [px, py],
                    })
                })
                .collect::<CdiResult<Vec<_>>>()
        })
        .collect()
}

fn topo_polygon(rings: &Value, arcs: &[Vec<[f64; 2]>]) -> CdiResult<Polygon> {
    let rings = rings
        .as_array()
        .ok_or_else(|| CdiError::BoundaryError("polygon arcs must be a list of rings".into()))?;
    let mut decoded = rings.iter().map(|r| topo_ring(r, arcs));
    let exterior = decoded
        .next()
        .ok_or_else(|| CdiError::BoundaryError("polygon has no exterior ring".into()))??;
    let holes = decoded.collect::<CdiResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

/// Stitch a ring from arc references. `~i` (negative) means arc `i` reversed.
fn topo_ring(indexes: &Value, arcs: &[Vec<[f64; 2]>]) -> CdiResult<Ring> {
    let indexes = indexes
        .as_array()
        .ok_or_else(|| CdiError::BoundaryError("ring arcs must be a list of indexes".into()))?;

    let mut points: Vec<[f64; 2]> = Vec::new();
    for idx in indexes {
        let idx = idx
            .as_i64()
            .ok_or_else(|| CdiError::BoundaryError(format!("invalid arc index {}", idx)))?;
        let (arc_idx, reversed) = if idx < 0 { (!idx, true) } else { (idx, false) };
        let arc = arcs
            .get(arc_idx as usize)
            .ok_or_else(|| CdiError::BoundaryError(format!("arc index {} out of range", arc_idx)))?;

        let mut segment: Vec<[f64; 2]> = arc.clone();
        if reversed {
            segment.reverse();
        }
        // Consecutive arcs share their joining point
        let skip = usize::from(!points.is_empty());
        points.extend(segment.into_iter().skip(skip));
    }
    Ok(Ring::new(points))
}
