//! Zonal statistics over CDI rasters.
//!
//! Each administrative polygon selects the raster pixels whose centres fall
//! inside it. The valid pixels (not nodata, not NaN) are aggregated and the
//! chosen statistic is classified into a drought category.
//!
//! # Pipeline
//!
//! ```text
//! GeoTIFF bytes ─► read_geotiff ─► Raster
//!                                    │
//! BoundarySet ───────────────────────┤
//!                                    ▼
//!                  per boundary (rayon):
//!                    window from bbox ─► pixel mask ─► ZonalStats
//!                                                        │
//!                                                        ▼
//!                                         Statistic ─► classify ─► CategoryValue
//! ```
//!
//! # Example
//!
//! ```ignore
//! use zonal_stats::{read_geotiff_file, zonal_categories, ZonalOptions};
//!
//! let raster = read_geotiff_file("cdi_2025_01.tif")?;
//! let values = zonal_categories(&raster, &boundaries, &ZonalOptions::default());
//! ```

pub mod error;
pub mod geotiff;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod stats;

pub use error::{ZonalError, ZonalResult};
pub use geotiff::{read_geotiff, read_geotiff_file, read_raster_bytes};
pub use pipeline::{zonal_categories, zonal_statistics, ZonalOptions, ZoneResult};
pub use raster::{GeoTransform, Raster};
pub use stats::{Statistic, ZonalStats};
