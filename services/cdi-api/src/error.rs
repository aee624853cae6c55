//! HTTP error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::error;

use cdi_common::CdiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// A [`CdiError`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(pub CdiError);

impl From<CdiError> for ApiError {
    fn from(err: CdiError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(CdiError::InvalidValues(rejection.body_text()))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn body(&self) -> Value {
        match &self.0 {
            CdiError::InvalidParameter { param, message } => json!({
                "message": self.0.to_string(),
                "details": { param.as_str(): [message] },
            }),
            CdiError::MissingParameter(param) => json!({
                "message": self.0.to_string(),
                "details": { param.as_str(): ["This field is required."] },
            }),
            CdiError::InvalidValues(_)
            | CdiError::InvalidTransition { .. }
            | CdiError::UnsupportedFormat(_) => json!({
                "message": self.0.to_string(),
                "details": { "non_field_errors": [self.0.to_string()] },
            }),
            CdiError::Unauthenticated | CdiError::Forbidden | CdiError::NotFound(_) => {
                json!({ "detail": self.0.to_string() })
            }
            CdiError::CatalogUnavailable(_) => {
                json!({ "message": "Server Error: Unable to fetch data." })
            }
            CdiError::ServiceUnavailable(_) => json!({ "message": self.0.to_string() }),
            _ => json!({ "message": "Internal server error" }),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_body() {
        let err = ApiError(CdiError::NotFound("Publication"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.body(),
            json!({"detail": "No Publication matches the given query."})
        );
    }

    #[test]
    fn test_validation_body_lists_field() {
        let err = ApiError(CdiError::invalid("due_date", "The date must be today or later."));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.body()["details"]["due_date"][0],
            "The date must be today or later."
        );
    }

    #[test]
    fn test_catalog_failure_is_generic() {
        let err = ApiError(CdiError::CatalogUnavailable("connection refused".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), json!({"message": "Server Error: Unable to fetch data."}));
    }
}
