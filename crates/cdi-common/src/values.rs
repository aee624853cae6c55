//! Per-region value entries carried by publications and reviews.

use crate::category::DroughtCategory;
use crate::error::{CdiError, CdiResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One region's entry in `initial_values` or `validated_values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryValue {
    #[serde(deserialize_with = "deserialize_id")]
    pub administration_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub category: Option<DroughtCategory>,
}

impl CategoryValue {
    pub fn new(administration_id: i64, value: Option<f64>, category: Option<DroughtCategory>) -> Self {
        Self {
            administration_id,
            value,
            category,
        }
    }
}

/// One region's entry in a review's `suggestion_values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(deserialize_with = "deserialize_id")]
    pub administration_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default)]
    pub category: Option<DroughtCategory>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reviewed: bool,
}

impl Suggestion {
    /// Seed an unreviewed suggestion from the publication's initial value.
    pub fn from_initial(value: &CategoryValue) -> Self {
        Self {
            administration_id: value.administration_id,
            value: value.value,
            category: value.category,
            comment: None,
            reviewed: false,
        }
    }
}

/// Entries keyed by administrative region.
pub trait AdministrationEntry {
    fn administration_id(&self) -> i64;
}

impl AdministrationEntry for CategoryValue {
    fn administration_id(&self) -> i64 {
        self.administration_id
    }
}

impl AdministrationEntry for Suggestion {
    fn administration_id(&self) -> i64 {
        self.administration_id
    }
}

/// Validate and decode a raw JSON values list.
///
/// The list must be an array of objects that each carry an
/// `administration_id`, with no region listed twice.
pub fn parse_values<T>(field: &str, raw: &Value) -> CdiResult<Vec<T>>
where
    T: DeserializeOwned + AdministrationEntry,
{
    let items = raw
        .as_array()
        .ok_or_else(|| CdiError::InvalidValues(format!("{} must be a list", field)))?;

    let mut out = Vec::with_capacity(items.len());
    let mut seen = HashSet::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or_else(|| {
            CdiError::InvalidValues(format!("{}[{}] must be an object", field, idx))
        })?;
        if !obj.contains_key("administration_id") {
            return Err(CdiError::InvalidValues(format!(
                "{}[{}] must contain 'administration_id'",
                field, idx
            )));
        }
        let entry: T = serde_json::from_value(item.clone())
            .map_err(|e| CdiError::InvalidValues(format!("{}[{}]: {}", field, idx, e)))?;
        if !seen.insert(entry.administration_id()) {
            return Err(CdiError::InvalidValues(format!(
                "{} lists administration {} more than once",
                field,
                entry.administration_id()
            )));
        }
        out.push(entry);
    }
    Ok(out)
}

/// Accept an integer id or a string holding one.
pub fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Float(v) if v.fract() == 0.0 => Ok(v as i64),
        Raw::Float(v) => Err(serde::de::Error::custom(format!("invalid id {}", v))),
        Raw::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid id '{}'", s))),
    }
}
