//! Per-boundary zonal statistics and classification.

use crate::mask::masked_values;
use crate::raster::Raster;
use crate::stats::{Statistic, ZonalStats};
use cdi_common::category::round3;
use cdi_common::{classify, BoundarySet, CategoryValue, DroughtCategory, NODATA_VALUE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZonalOptions {
    #[serde(default)]
    pub statistic: Statistic,
    /// Select every pixel the polygon touches instead of centre-inside pixels.
    #[serde(default)]
    pub all_touched: bool,
}

/// Outcome for one administrative region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneResult {
    pub administration_id: i64,
    pub stats: Option<ZonalStats>,
    /// Chosen statistic rounded to 3 decimals, or `-9999` without data.
    pub value: f64,
    pub category: DroughtCategory,
}

impl From<&ZoneResult> for CategoryValue {
    fn from(z: &ZoneResult) -> Self {
        CategoryValue::new(z.administration_id, Some(z.value), Some(z.category))
    }
}

/// Compute statistics for every boundary, in boundary order.
pub fn zonal_statistics(
    raster: &Raster,
    boundaries: &BoundarySet,
    options: &ZonalOptions,
) -> Vec<ZoneResult> {
    let raster_bbox = raster.bbox();
    let results: Vec<ZoneResult> = boundaries
        .as_slice()
        .par_iter()
        .map(|boundary| {
            let values = masked_values(raster, &boundary.geometry, options.all_touched);
            let stats = ZonalStats::compute(values);
            let (value, category) = match &stats {
                Some(s) => {
                    let v = round3(s.get(options.statistic));
                    (v, classify(v))
                }
                None => (NODATA_VALUE, DroughtCategory::NoData),
            };
            debug!(
                administration_id = boundary.administration_id,
                pixels = stats.as_ref().map_or(0, |s| s.count),
                value,
                category = %category,
                "Computed zone"
            );
            ZoneResult {
                administration_id: boundary.administration_id,
                stats,
                value,
                category,
            }
        })
        .collect();

    let empty = results.iter().filter(|r| r.stats.is_none()).count();
    if empty > 0 {
        warn!(
            empty_zones = empty,
            raster_bbox = ?raster_bbox,
            "Some boundaries have no valid pixels"
        );
    }
    info!(
        zones = results.len(),
        statistic = %options.statistic,
        all_touched = options.all_touched,
        "Zonal statistics complete"
    );
    results
}

/// Per-region values ready to store as a publication's `initial_values`.
pub fn zonal_categories(
    raster: &Raster,
    boundaries: &BoundarySet,
    options: &ZonalOptions,
) -> Vec<CategoryValue> {
    zonal_statistics(raster, boundaries, options)
        .iter()
        .map(CategoryValue::from)
        .collect()
}
