//! The map being exported: boundaries joined with their categories.

use cdi_common::{BoundarySet, BoundingBox, CategoryValue, DroughtCategory, MultiPolygon, YearMonth};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub administration_id: i64,
    pub name: String,
    pub region: Option<String>,
    pub geometry: MultiPolygon,
    pub value: Option<f64>,
    pub category: DroughtCategory,
}

impl MapFeature {
    pub fn cat_name(&self) -> &'static str {
        self.category.label()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    pub year_month: YearMonth,
    pub features: Vec<MapFeature>,
}

impl MapDocument {
    /// Join every boundary with its value. Regions without a category are
    /// drawn as `Normal`; values for unknown regions are dropped.
    pub fn new(year_month: YearMonth, boundaries: &BoundarySet, values: &[CategoryValue]) -> Self {
        let by_id: HashMap<i64, &CategoryValue> =
            values.iter().map(|v| (v.administration_id, v)).collect();

        let features = boundaries
            .iter()
            .map(|boundary| {
                let entry = by_id.get(&boundary.administration_id);
                MapFeature {
                    administration_id: boundary.administration_id,
                    name: boundary.name.clone(),
                    region: boundary.region.clone(),
                    geometry: boundary.geometry.clone(),
                    value: entry.and_then(|v| v.value),
                    category: entry
                        .and_then(|v| v.category)
                        .unwrap_or(DroughtCategory::Normal),
                }
            })
            .collect();

        Self {
            year_month,
            features,
        }
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.bbox())
            .reduce(|a, b| a.union(&b))
    }

    /// File name stem shared by every export format.
    pub fn file_stem(&self) -> String {
        format!("cdi_map_{}", self.year_month)
    }
}
