//! HTTP mapping of domain errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use compliance_core::ComplianceError;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub ComplianceError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ComplianceError::NotFound(_) => StatusCode::NOT_FOUND,
            ComplianceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ComplianceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ComplianceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ComplianceError::Conflict(_) => StatusCode::CONFLICT,
            ComplianceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ComplianceError::Email(_)
            | ComplianceError::Config(_)
            | ComplianceError::Serialization(_)
            | ComplianceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self.0, code = self.0.code(), "Request failed");
            metrics::counter!("api.errors", "code" => self.0.code()).increment(1);
            "Internal processing error".to_string()
        } else {
            self.0.to_string()
        };
        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ComplianceError::not_found("Risk 1"), StatusCode::NOT_FOUND),
            (ComplianceError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (ComplianceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ComplianceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ComplianceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ComplianceError::Gateway("x".into()), StatusCode::BAD_GATEWAY),
            (ComplianceError::Config("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }

    #[tokio::test]
    async fn test_server_errors_hide_details() {
        use http_body_util::BodyExt;

        let response = ApiError(ComplianceError::Config("secret missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "config_error");
        assert!(!body.message.contains("secret"));
    }
}
