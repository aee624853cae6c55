//! SVG export: one path per administration plus a legend.

use std::fmt::Write;

use cdi_common::{CdiError, CdiResult};

use crate::canvas::Viewport;
use crate::document::MapDocument;
use crate::style::{legend, OUTLINE_HEX};

const LEGEND_ROW: u32 = 18;
const LEGEND_SWATCH: u32 = 12;
const TITLE_HEIGHT: u32 = 24;

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_svg(doc: &MapDocument, width: u32, padding: u32) -> CdiResult<String> {
    let bbox = doc
        .bbox()
        .ok_or_else(|| CdiError::RenderError("map has no geometry".to_string()))?;
    let viewport = Viewport::fit(&bbox, width, padding);
    let rows = legend();
    let legend_height = LEGEND_ROW * rows.len() as u32 + padding;
    let height = TITLE_HEIGHT + viewport.height + legend_height;

    render(doc, &viewport, height).map_err(|e| CdiError::RenderError(e.to_string()))
}

fn render(doc: &MapDocument, viewport: &Viewport, height: u32) -> Result<String, std::fmt::Error> {
    let width = viewport.width;
    let mut svg = String::new();

    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    )?;
    writeln!(svg, r##"<rect width="100%" height="100%" fill="#ffffff"/>"##)?;
    writeln!(
        svg,
        r#"<text x="{}" y="17" font-family="sans-serif" font-size="14" text-anchor="middle">CDI Map {}</text>"#,
        width / 2,
        escape_xml(&doc.year_month.label())
    )?;

    writeln!(
        svg,
        r#"<g id="features" transform="translate(0,{})" stroke="{}" stroke-width="0.5" fill-rule="evenodd">"#,
        TITLE_HEIGHT, OUTLINE_HEX
    )?;
    for feature in &doc.features {
        let mut d = String::new();
        for polygon in feature.geometry.polygons() {
            for ring in polygon.rings() {
                for (i, (x, y)) in viewport.project_ring(ring.points()).into_iter().enumerate() {
                    let cmd = if i == 0 { 'M' } else { 'L' };
                    write!(d, "{}{:.2},{:.2} ", cmd, x, y)?;
                }
                d.push_str("Z ");
            }
        }
        writeln!(
            svg,
            r#"<path data-administration-id="{}" d="{}" fill="{}"><title>{}: {}</title></path>"#,
            feature.administration_id,
            d.trim_end(),
            feature.category.hex_color(),
            escape_xml(&feature.name),
            feature.cat_name()
        )?;
    }
    writeln!(svg, "</g>")?;

    writeln!(
        svg,
        r#"<g id="legend" transform="translate(8,{})" font-family="sans-serif" font-size="11">"#,
        TITLE_HEIGHT + viewport.height
    )?;
    for (i, row) in legend().iter().enumerate() {
        let y = i as u32 * LEGEND_ROW;
        writeln!(
            svg,
            r#"<rect x="0" y="{}" width="{s}" height="{s}" fill="{}" stroke="{}" stroke-width="0.5"/><text x="{}" y="{}">{}</text>"#,
            y,
            row.color,
            OUTLINE_HEX,
            LEGEND_SWATCH + 6,
            y + LEGEND_SWATCH - 2,
            escape_xml(row.label),
            s = LEGEND_SWATCH
        )?;
    }
    writeln!(svg, "</g>")?;
    svg.push_str("</svg>\n");

    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("A & B <c>"), "A &amp; B &lt;c&gt;");
        assert_eq!(escape_xml("O'Neil \"x\""), "O&apos;Neil &quot;x&quot;");
    }
}
