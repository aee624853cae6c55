//! Export format selection and dispatch.

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use cdi_common::{CdiError, CdiResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::canvas::{Canvas, Viewport};
use crate::document::MapDocument;
use crate::style::{category_rgba, BACKGROUND, OUTLINE};
use crate::{geojson, png, shapefile, svg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    GeoJson,
    Shapefile,
    Png,
    Svg,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::GeoJson,
        ExportFormat::Shapefile,
        ExportFormat::Png,
        ExportFormat::Svg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Shapefile => "shapefile",
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "application/json",
            ExportFormat::Shapefile => "application/zip",
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoJson => "geojson",
            ExportFormat::Shapefile => "zip",
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = CdiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(ExportFormat::GeoJson),
            "shapefile" | "shp" => Ok(ExportFormat::Shapefile),
            "png" => Ok(ExportFormat::Png),
            "svg" => Ok(ExportFormat::Svg),
            _ => Err(CdiError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub image_width: u32,
    pub padding: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_width: 1200,
            padding: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Rasterize the map: category fills first, outlines on top.
pub fn render_canvas(doc: &MapDocument, options: &RenderOptions) -> CdiResult<Canvas> {
    let bbox = doc
        .bbox()
        .ok_or_else(|| CdiError::RenderError("map has no geometry".to_string()))?;
    let viewport = Viewport::fit(&bbox, options.image_width.max(1), options.padding);
    let mut canvas = Canvas::new(viewport.width, viewport.height, BACKGROUND)?;

    for feature in &doc.features {
        let fill = category_rgba(feature.category);
        for polygon in feature.geometry.polygons() {
            canvas.draw_polygon(&viewport, polygon, fill, OUTLINE);
        }
    }

    Ok(canvas)
}

pub fn render_png(doc: &MapDocument, options: &RenderOptions) -> CdiResult<Vec<u8>> {
    let canvas = render_canvas(doc, options)?;
    png::encode_png(canvas.pixels(), canvas.width, canvas.height)
}

#[instrument(skip(doc, options), fields(year_month = %doc.year_month, features = doc.features.len()))]
pub fn export_map(format: ExportFormat, doc: &MapDocument, options: &RenderOptions) -> CdiResult<ExportedFile> {
    let start = Instant::now();

    let bytes = match format {
        ExportFormat::GeoJson => geojson::to_geojson_bytes(doc)?,
        ExportFormat::Shapefile => shapefile::to_shapefile_zip(doc)?,
        ExportFormat::Png => render_png(doc, options)?,
        ExportFormat::Svg => svg::render_svg(doc, options.image_width, options.padding)?.into_bytes(),
    };

    debug!(
        bytes = bytes.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Map exported"
    );

    Ok(ExportedFile {
        filename: format!("{}.{}", doc.file_stem(), format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}
