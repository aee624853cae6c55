//! Colours for drought map rendering.

use cdi_common::DroughtCategory;
use serde::Serialize;

pub type Rgba = (u8, u8, u8, u8);

pub const BACKGROUND: Rgba = (255, 255, 255, 255);
pub const OUTLINE: Rgba = (64, 64, 64, 255);
pub const OUTLINE_HEX: &str = "#404040";

/// Parse hex color string to RGB
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

/// Opaque fill colour of a category.
pub fn category_rgba(category: DroughtCategory) -> Rgba {
    let (r, g, b) = hex_to_rgb(category.hex_color()).unwrap_or((255, 255, 255));
    (r, g, b, 255)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub category: DroughtCategory,
    pub label: &'static str,
    pub color: &'static str,
}

/// Legend rows in severity order, `No Data` last.
pub fn legend() -> Vec<LegendEntry> {
    DroughtCategory::ALL
        .iter()
        .map(|&category| LegendEntry {
            category,
            label: category.label(),
            color: category.hex_color(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#e60000"), Some((230, 0, 0)));
        assert_eq!(hex_to_rgb("730000"), Some((115, 0, 0)));
        assert_eq!(hex_to_rgb("#fff"), None);
        assert_eq!(hex_to_rgb("#gg0000"), None);
    }

    #[test]
    fn test_every_category_has_a_colour() {
        for category in DroughtCategory::ALL {
            assert!(hex_to_rgb(category.hex_color()).is_some(), "{}", category);
        }
        assert_eq!(category_rgba(DroughtCategory::D2), (255, 170, 0, 255));
    }

    #[test]
    fn test_legend_order() {
        let rows = legend();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].category, DroughtCategory::Normal);
        assert_eq!(rows[5].label, "Exceptional Drought");
        assert_eq!(rows[6].category, DroughtCategory::NoData);
    }
}
