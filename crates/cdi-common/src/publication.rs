//! Publication workflow states.

use crate::error::{CdiError, CdiResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Lifecycle of a monthly drought map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PublicationStatus {
    InReview,
    InValidation,
    Published,
}

impl PublicationStatus {
    pub fn code(&self) -> i64 {
        match self {
            PublicationStatus::InReview => 1,
            PublicationStatus::InValidation => 2,
            PublicationStatus::Published => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PublicationStatus::InReview),
            2 => Some(PublicationStatus::InValidation),
            3 => Some(PublicationStatus::Published),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PublicationStatus::InReview => "In Review",
            PublicationStatus::InValidation => "In Validation",
            PublicationStatus::Published => "Published",
        }
    }

    /// Check a requested status change.
    ///
    /// Moves are forward only. Re-applying the current status is accepted.
    pub fn transition_to(self, next: PublicationStatus) -> CdiResult<PublicationStatus> {
        if next < self {
            return Err(CdiError::InvalidTransition {
                from: self.label().to_string(),
                to: next.label().to_string(),
            });
        }
        Ok(next)
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PublicationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for PublicationStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown publication status {}", code)))
    }
}

/// Progress string of the form `"{completed}/{total}"`.
pub fn progress(completed: usize, total: usize) -> String {
    format!("{}/{}", completed, total)
}
