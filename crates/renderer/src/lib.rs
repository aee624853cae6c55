//! Drought map exports.
//!
//! A [`MapDocument`] joins the administration boundaries with the validated
//! categories of one month; [`export_map`] turns it into one of:
//! - GeoJSON FeatureCollection
//! - zipped ESRI Shapefile
//! - PNG (scanline-filled polygons)
//! - SVG with a legend

pub mod canvas;
pub mod document;
pub mod export;
pub mod geojson;
pub mod png;
pub mod shapefile;
pub mod style;
pub mod svg;

pub use document::{MapDocument, MapFeature};
pub use export::{export_map, render_canvas, render_png, ExportFormat, ExportedFile, RenderOptions};
pub use style::{legend, LegendEntry};
