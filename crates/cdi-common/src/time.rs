//! Calendar helpers for monthly publications.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A publication month, stored as the first day of that month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(YearMonth)
    }

    /// Month containing the given date.
    pub fn of(date: NaiveDate) -> Self {
        YearMonth(date.with_day(1).unwrap_or(date))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// `"February 2025"`
    pub fn label(&self) -> String {
        self.0.format("%B %Y").to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid month format: {0}. Expected 'YYYY-MM' or 'YYYY-MM-DD'")]
    InvalidMonth(String),

    #[error("Invalid date format: {0}. Expected 'YYYY-MM-DD'")]
    InvalidDate(String),
}

impl FromStr for YearMonth {
    type Err = TimeParseError;

    /// Accepts `YYYY-MM` or `YYYY-MM-DD`; the day is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(YearMonth::of(date));
        }
        NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
            .map(YearMonth)
            .map_err(|_| TimeParseError::InvalidMonth(s.to_string()))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a `YYYY-MM-DD` date, tolerating a trailing time component.
pub fn parse_date(s: &str) -> Result<NaiveDate, TimeParseError> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| TimeParseError::InvalidDate(s.to_string()))
}

/// Review deadline for a dataset dated `date`.
pub fn default_due_date(date: NaiveDate) -> NaiveDate {
    date + Duration::days(30)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_month() {
        let ym: YearMonth = "2025-02".parse().unwrap();
        assert_eq!(ym.to_string(), "2025-02");
        let ym: YearMonth = "2025-02-17".parse().unwrap();
        assert_eq!(ym.first_day(), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("garbage".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_label() {
        let ym = YearMonth::new(2025, 2).unwrap();
        assert_eq!(ym.label(), "February 2025");
    }

    #[test]
    fn test_parse_date_with_time() {
        let d = parse_date("2024-11-05T10:22:01.123Z").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 11, 5).unwrap());
        assert_eq!(
            default_due_date(d),
            NaiveDate::from_ymd_opt(2024, 12, 5).unwrap()
        );
    }
}
