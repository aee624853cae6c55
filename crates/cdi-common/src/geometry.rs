//! Polygon geometry for administrative boundaries.
//!
//! Coordinates are `[x, y]` pairs (longitude, latitude). Rings are stored
//! closed; the last coordinate repeats the first.

use crate::bbox::BoundingBox;
use serde::{Deserialize, Serialize};

/// A closed linear ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ring(pub Vec<[f64; 2]>);

impl Ring {
    /// Build a ring, closing it if the input is open.
    pub fn new(mut points: Vec<[f64; 2]>) -> Self {
        if let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) {
            if first != last {
                points.push(first);
            }
        }
        Ring(points)
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.0
    }

    /// A ring needs at least three distinct vertices plus the closing point.
    pub fn is_valid(&self) -> bool {
        self.0.len() >= 4
    }

    /// Shoelace area; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        self.0
            .windows(2)
            .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
            .sum::<f64>()
            / 2.0
    }

    pub fn is_clockwise(&self) -> bool {
        self.signed_area() < 0.0
    }

    /// Copy of the ring with the requested winding.
    pub fn with_winding(&self, clockwise: bool) -> Ring {
        if self.is_clockwise() == clockwise {
            self.clone()
        } else {
            let mut pts = self.0.clone();
            pts.reverse();
            Ring(pts)
        }
    }

    /// Even-odd ray casting test.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        let pts = &self.0;
        let n = pts.len();
        if n < 4 {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = pts[i];
            let [xj, yj] = pts[j];
            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.0.iter())
    }

    pub fn segments(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

/// Exterior ring with optional holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Ring,
    #[serde(default)]
    pub holes: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self { exterior, holes }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.exterior.contains_point(x, y) && !self.holes.iter().any(|h| h.contains_point(x, y))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.exterior.bbox()
    }

    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        std::iter::once(&self.exterior).chain(self.holes.iter())
    }

    /// Whether the polygon overlaps or touches an axis-aligned rectangle.
    pub fn intersects_rect(&self, rect: &BoundingBox) -> bool {
        match self.bbox() {
            Some(b) if b.intersects(rect) => {}
            _ => return false,
        }

        // Rectangle fully inside the polygon
        let cx = (rect.min_x + rect.max_x) / 2.0;
        let cy = (rect.min_y + rect.max_y) / 2.0;
        if self.contains_point(cx, cy) {
            return true;
        }

        self.rings()
            .flat_map(|r| r.segments())
            .any(|(a, b)| segment_intersects_rect(a, b, rect))
    }
}

/// A set of polygons treated as one zone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultiPolygon(pub Vec<Polygon>);

impl MultiPolygon {
    pub fn polygons(&self) -> &[Polygon] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        self.0.iter().any(|p| p.contains_point(x, y))
    }

    pub fn intersects_rect(&self, rect: &BoundingBox) -> bool {
        self.0.iter().any(|p| p.intersects_rect(rect))
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.0
            .iter()
            .filter_map(Polygon::bbox)
            .reduce(|a, b| a.union(&b))
    }
}

impl From<Polygon> for MultiPolygon {
    fn from(p: Polygon) -> Self {
        MultiPolygon(vec![p])
    }
}

/// Liang-Barsky clip test of a segment against a rectangle.
fn segment_intersects_rect(a: [f64; 2], b: [f64; 2], rect: &BoundingBox) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let checks = [
        (-dx, a[0] - rect.min_x),
        (dx, rect.max_x - a[0]),
        (-dy, a[1] - rect.min_y),
        (dy, rect.max_y - a[1]),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return false;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Ring {
        Ring::new(vec![
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
        ])
    }

    #[test]
    fn test_ring_closes() {
        let r = square(0.0, 0.0, 1.0);
        assert_eq!(r.points().len(), 5);
        assert_eq!(r.points()[0], r.points()[4]);
    }

    #[test]
    fn test_winding() {
        let ccw = square(0.0, 0.0, 2.0);
        assert!(!ccw.is_clockwise());
        assert_eq!(ccw.signed_area(), 4.0);
        let cw = ccw.with_winding(true);
        assert!(cw.is_clockwise());
    }

    #[test]
    fn test_polygon_with_hole() {
        let poly = Polygon::new(square(0.0, 0.0, 10.0), vec![square(4.0, 4.0, 2.0)]);
        assert!(poly.contains_point(1.0, 1.0));
        assert!(!poly.contains_point(5.0, 5.0));
        assert!(!poly.contains_point(11.0, 5.0));
    }

    #[test]
    fn test_multipolygon() {
        let mp = MultiPolygon(vec![
            Polygon::new(square(0.0, 0.0, 1.0), vec![]),
            Polygon::new(square(5.0, 5.0, 1.0), vec![]),
        ]);
        assert!(mp.contains_point(0.5, 0.5));
        assert!(mp.contains_point(5.5, 5.5));
        assert!(!mp.contains_point(3.0, 3.0));
        assert_eq!(mp.bbox().unwrap(), BoundingBox::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn test_intersects_rect() {
        let poly = Polygon::new(square(0.0, 0.0, 10.0), vec![]);
        // Straddles the right edge
        assert!(poly.intersects_rect(&BoundingBox::new(9.5, 4.0, 10.5, 5.0)));
        // Fully inside
        assert!(poly.intersects_rect(&BoundingBox::new(4.0, 4.0, 5.0, 5.0)));
        // Disjoint
        assert!(!poly.intersects_rect(&BoundingBox::new(11.0, 11.0, 12.0, 12.0)));
    }

    #[test]
    fn test_triangle_edge_crossing_cell() {
        // Thin triangle whose edge cuts through the cell without a vertex in it
        let tri = Polygon::new(
            Ring::new(vec![[0.0, 0.0], [10.0, 0.2], [0.0, 0.4]]),
            vec![],
        );
        assert!(tri.intersects_rect(&BoundingBox::new(4.0, 0.0, 5.0, 1.0)));
        assert!(!tri.intersects_rect(&BoundingBox::new(4.0, 0.5, 5.0, 1.0)));
    }
}
