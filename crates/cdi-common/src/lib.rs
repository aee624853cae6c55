//! Common types and utilities shared across the CDI map services.

pub mod archive;
pub mod bbox;
pub mod boundaries;
pub mod category;
pub mod error;
pub mod geometry;
pub mod publication;
pub mod review;
pub mod time;
pub mod values;

pub use bbox::BoundingBox;
pub use boundaries::{AdminBoundary, BoundarySet};
pub use category::{classify, DroughtCategory, NODATA_VALUE};
pub use error::{CdiError, CdiResult};
pub use geometry::{MultiPolygon, Polygon, Ring};
pub use publication::PublicationStatus;
pub use review::{ReviewFilter, ReviewSnapshot, ReviewerInfo};
pub use time::YearMonth;
pub use values::{CategoryValue, Suggestion};
