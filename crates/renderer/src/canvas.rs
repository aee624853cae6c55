//! Map rasterisation.
//!
//! [`Viewport`] maps lon/lat onto image pixels. [`Canvas`] wraps a
//! `tiny_skia::Pixmap`: administrations are filled with the even-odd rule so
//! holes stay empty, then outlined. Anti-aliasing is off, which keeps the
//! image to the flat category colours the PNG palette pass expects.

use cdi_common::{BoundingBox, CdiError, CdiResult, Polygon};
use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::style::Rgba;

/// Upper bound on output height relative to the width.
const MAX_ASPECT: f64 = 4.0;

/// Maps lon/lat onto an image, preserving the aspect ratio of `bbox`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    padding: f64,
    scale: f64,
    min_x: f64,
    max_y: f64,
}

impl Viewport {
    pub fn fit(bbox: &BoundingBox, width: u32, padding: u32) -> Self {
        let padding = padding.min(width / 4) as f64;
        let inner_width = (width as f64 - 2.0 * padding).max(1.0);
        let scale = if bbox.width() > 0.0 {
            inner_width / bbox.width()
        } else {
            1.0
        };
        let inner_height = (bbox.height() * scale).min(inner_width * MAX_ASPECT);
        let scale = if bbox.height() > 0.0 {
            scale.min(inner_height / bbox.height())
        } else {
            scale
        };
        let height = (inner_height.ceil() + 2.0 * padding).max(1.0) as u32;

        Self {
            width,
            height,
            padding,
            scale,
            min_x: bbox.min_x,
            max_y: bbox.max_y,
        }
    }

    /// Image coordinates (y down) of a lon/lat point.
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.padding + (x - self.min_x) * self.scale,
            self.padding + (self.max_y - y) * self.scale,
        )
    }

    pub fn project_ring(&self, points: &[[f64; 2]]) -> Vec<(f64, f64)> {
        points.iter().map(|p| self.project(p[0], p[1])).collect()
    }
}

/// RGBA drawing surface. Pixels are premultiplied, which equals straight
/// RGBA as long as every colour drawn is opaque.
pub struct Canvas {
    pub width: usize,
    pub height: usize,
    pixmap: Pixmap,
}

impl Canvas {
    /// A canvas of `width` x `height` pixels cleared to `background`.
    ///
    /// # Errors
    ///
    /// `RenderError` when either dimension is zero.
    pub fn new(width: u32, height: u32, background: Rgba) -> CdiResult<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            CdiError::RenderError(format!("cannot allocate a {}x{} canvas", width, height))
        })?;
        let (r, g, b, a) = background;
        pixmap.fill(Color::from_rgba8(r, g, b, a));
        Ok(Self {
            width: width as usize,
            height: height as usize,
            pixmap,
        })
    }

    /// Row-major RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        self.pixmap.data()
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        let c = self.pixmap.pixel(x, y)?.demultiply();
        Some((c.red(), c.green(), c.blue(), c.alpha()))
    }

    /// Fill one polygon given as image-space rings (exterior first, then holes).
    ///
    /// A pixel is painted when its centre is inside under the even-odd rule.
    pub fn fill_polygon(&mut self, rings: &[Vec<(f64, f64)>], color: Rgba) {
        if let Some(path) = rings_path(rings, true) {
            self.pixmap.fill_path(
                &path,
                &solid(color),
                FillRule::EvenOdd,
                Transform::identity(),
                None,
            );
        }
    }

    /// One-pixel outline along an image-space ring.
    pub fn stroke_ring(&mut self, ring: &[(f64, f64)], color: Rgba) {
        let Some(path) = rings_path(&[ring], false) else {
            return;
        };
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    /// Fill then outline a polygon given in lon/lat.
    pub fn draw_polygon(&mut self, viewport: &Viewport, polygon: &Polygon, fill: Rgba, outline: Rgba) {
        let rings: Vec<Vec<(f64, f64)>> = polygon
            .rings()
            .map(|r| viewport.project_ring(r.points()))
            .collect();
        self.fill_polygon(&rings, fill);
        for ring in &rings {
            self.stroke_ring(ring, outline);
        }
    }
}

fn solid(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0, color.1, color.2, color.3);
    paint.anti_alias = false;
    paint
}

/// Path through every ring; `None` when no ring has two points.
fn rings_path<R: AsRef<[(f64, f64)]>>(rings: &[R], close: bool) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for ring in rings.iter().map(AsRef::as_ref).filter(|r| r.len() >= 2) {
        let (x, y) = ring[0];
        pb.move_to(x as f32, y as f32);
        for &(x, y) in &ring[1..] {
            pb.line_to(x as f32, y as f32);
        }
        if close {
            pb.close();
        }
    }
    pb.finish()
}
