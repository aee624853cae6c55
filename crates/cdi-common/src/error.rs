//! The error type shared by every CDI crate, with its HTTP status mapping.

use thiserror::Error;

pub type CdiResult<T> = Result<T, CdiError>;

#[derive(Debug, Error)]
pub enum CdiError {
    // Rejected input
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid values: {0}")]
    InvalidValues(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Requested format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Authentication credentials were not provided")]
    Unauthenticated,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("No {0} matches the given query.")]
    NotFound(&'static str),

    // Boundary files, export archives and GeoNode
    #[error("Invalid boundary data: {0}")]
    BoundaryError(String),

    #[error("Invalid archive: {0}")]
    ArchiveError(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl CdiError {
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        CdiError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Status the REST API answers with. Anything not listed is a 500.
    pub fn http_status_code(&self) -> u16 {
        match self {
            CdiError::MissingParameter(_)
            | CdiError::InvalidParameter { .. }
            | CdiError::InvalidValues(_)
            | CdiError::InvalidTransition { .. }
            | CdiError::UnsupportedFormat(_) => 400,

            CdiError::Unauthenticated => 401,
            CdiError::Forbidden => 403,
            CdiError::NotFound(_) => 404,

            CdiError::ServiceUnavailable(_) => 503,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for CdiError {
    fn from(err: std::io::Error) -> Self {
        CdiError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for CdiError {
    fn from(err: serde_json::Error) -> Self {
        CdiError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CdiError::invalid("due_date", "in the past").http_status_code(), 400);
        assert_eq!(CdiError::Unauthenticated.http_status_code(), 401);
        assert_eq!(CdiError::Forbidden.http_status_code(), 403);
        assert_eq!(CdiError::NotFound("Publication").http_status_code(), 404);
        assert_eq!(CdiError::CatalogUnavailable("timeout".into()).http_status_code(), 500);
    }

    #[test]
    fn test_not_found_message() {
        let err = CdiError::NotFound("Publication");
        assert_eq!(err.to_string(), "No Publication matches the given query.");
    }
}
