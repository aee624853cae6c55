//! Aggregation of masked pixel values.

use crate::error::ZonalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Summary of the valid pixels of one zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZonalStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub sum: f64,
}

impl ZonalStats {
    /// Returns `None` when there are no values.
    pub fn compute(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        };

        Some(Self {
            count,
            min: values[0],
            max: values[count - 1],
            mean: sum / count as f64,
            median,
            sum,
        })
    }

    pub fn get(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::Median => self.median,
            Statistic::Min => self.min,
            Statistic::Max => self.max,
            Statistic::Sum => self.sum,
            Statistic::Count => self.count as f64,
        }
    }
}

/// Which summary value represents a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Sum,
    /// Number of valid pixels.
    Count,
}

impl FromStr for Statistic {
    type Err = ZonalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "sum" => Ok(Statistic::Sum),
            "count" => Ok(Statistic::Count),
            other => Err(ZonalError::UnknownStatistic(other.to_string())),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Min => "min",
            Statistic::Max => "max",
            Statistic::Sum => "sum",
            Statistic::Count => "count",
        };
        f.write_str(name)
    }
}
