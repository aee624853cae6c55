//! Drought severity categories and the threshold classifier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Sentinel written for zones without any valid raster pixel.
pub const NODATA_VALUE: f64 = -9999.0;

/// Drought category of an administrative region.
///
/// Serialized as its integer code. Clients may also send the short name
/// (`"d3"`, `"normal"`), so deserialization accepts both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DroughtCategory {
    NoData,
    Normal,
    D0,
    D1,
    D2,
    D3,
    D4,
}

impl DroughtCategory {
    pub const ALL: [DroughtCategory; 7] = [
        DroughtCategory::Normal,
        DroughtCategory::D0,
        DroughtCategory::D1,
        DroughtCategory::D2,
        DroughtCategory::D3,
        DroughtCategory::D4,
        DroughtCategory::NoData,
    ];

    pub fn code(&self) -> i32 {
        match self {
            DroughtCategory::NoData => -9999,
            DroughtCategory::Normal => 0,
            DroughtCategory::D0 => 1,
            DroughtCategory::D1 => 2,
            DroughtCategory::D2 => 3,
            DroughtCategory::D3 => 4,
            DroughtCategory::D4 => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -9999 => Some(DroughtCategory::NoData),
            0 => Some(DroughtCategory::Normal),
            1 => Some(DroughtCategory::D0),
            2 => Some(DroughtCategory::D1),
            3 => Some(DroughtCategory::D2),
            4 => Some(DroughtCategory::D3),
            5 => Some(DroughtCategory::D4),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            DroughtCategory::NoData => "none",
            DroughtCategory::Normal => "normal",
            DroughtCategory::D0 => "d0",
            DroughtCategory::D1 => "d1",
            DroughtCategory::D2 => "d2",
            DroughtCategory::D3 => "d3",
            DroughtCategory::D4 => "d4",
        }
    }

    /// Human readable label used in exports and legends.
    pub fn label(&self) -> &'static str {
        match self {
            DroughtCategory::NoData => "No Data",
            DroughtCategory::Normal => "Normal or wet conditions",
            DroughtCategory::D0 => "Abnormally Dry",
            DroughtCategory::D1 => "Moderate Drought",
            DroughtCategory::D2 => "Severe Drought",
            DroughtCategory::D3 => "Extreme Drought",
            DroughtCategory::D4 => "Exceptional Drought",
        }
    }

    /// Map fill colour as `#rrggbb`.
    pub fn hex_color(&self) -> &'static str {
        match self {
            DroughtCategory::NoData => "#ffffff",
            DroughtCategory::Normal => "#b9f8cf",
            DroughtCategory::D0 => "#ffff00",
            DroughtCategory::D1 => "#fbd47f",
            DroughtCategory::D2 => "#ffaa00",
            DroughtCategory::D3 => "#e60000",
            DroughtCategory::D4 => "#730000",
        }
    }
}

impl fmt::Display for DroughtCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown drought category: {0}")]
pub struct CategoryParseError(pub String);

impl FromStr for DroughtCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code).ok_or_else(|| CategoryParseError(s.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "normal" => Ok(DroughtCategory::Normal),
            "d0" => Ok(DroughtCategory::D0),
            "d1" => Ok(DroughtCategory::D1),
            "d2" => Ok(DroughtCategory::D2),
            "d3" => Ok(DroughtCategory::D3),
            "d4" => Ok(DroughtCategory::D4),
            "none" | "no_data" | "nodata" => Ok(DroughtCategory::NoData),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}

impl Serialize for DroughtCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for DroughtCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(i64),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Self::from_code(code)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown category code {}", code))),
            Raw::Name(name) => name.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Round half away from zero to three decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Classify a zonal CDI value into a drought category.
///
/// Lower index values mean drier conditions. Values above the D0 band, and
/// negative values, are normal or wet.
pub fn classify(value: f64) -> DroughtCategory {
    if !value.is_finite() || value == NODATA_VALUE {
        return DroughtCategory::NoData;
    }
    let v = round3(value);
    if v < 0.0 {
        DroughtCategory::Normal
    } else if v <= 0.02 {
        DroughtCategory::D4
    } else if v <= 0.05 {
        DroughtCategory::D3
    } else if v <= 0.1 {
        DroughtCategory::D2
    } else if v <= 0.2 {
        DroughtCategory::D1
    } else if v <= 0.3 {
        DroughtCategory::D0
    } else {
        DroughtCategory::Normal
    }
}
