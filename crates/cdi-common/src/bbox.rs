//! Lon/lat extents of boundaries and raster windows.

use serde::{Deserialize, Serialize};

/// Extent in EPSG:4326 degrees. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Extent of a vertex list; `None` when there are no vertices.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a [f64; 2]>,
    {
        points.into_iter().fold(None, |acc, &[x, y]| {
            let point = Self::new(x, y, x, y);
            Some(match acc {
                Some(extent) => point.union(&extent),
                None => point,
            })
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Overlap test; a shared edge or corner counts.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        let disjoint_x = self.max_x < other.min_x || other.max_x < self.min_x;
        let disjoint_y = self.max_y < other.min_y || other.max_y < self.min_y;
        !(disjoint_x || disjoint_y)
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }
}
