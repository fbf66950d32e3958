use crate::error::OnboardingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// An `OnboardingError` on its way out of an HTTP handler.
#[derive(Debug)]
pub struct ApiError {
    error: OnboardingError,
    status: StatusCode,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Overrides the status for processor rejections, e.g. 409 for a
    /// micro-deposit amount mismatch.
    pub fn rejection_status(mut self, status: StatusCode) -> Self {
        if matches!(self.error, OnboardingError::RequestRejected { .. }) {
            self.status = status;
        }
        self
    }
}

impl From<OnboardingError> for ApiError {
    fn from(error: OnboardingError) -> Self {
        let status = match &error {
            OnboardingError::Validation(_) => StatusCode::BAD_REQUEST,
            OnboardingError::RequestRejected { .. } => StatusCode::BAD_REQUEST,
            OnboardingError::NotFound(_) => StatusCode::NOT_FOUND,
            OnboardingError::PreconditionFailed(_) => StatusCode::CONFLICT,
            OnboardingError::AlreadyInProgress(_) => StatusCode::CONFLICT,
            OnboardingError::AuthFailure(_) => StatusCode::BAD_GATEWAY,
            OnboardingError::TransientFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            OnboardingError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { error, status }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_kind: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(error = %self.error, "request failed");
        }
        let error_kind = self.error.kind();
        let (detail, provider_code) = match self.error {
            OnboardingError::RequestRejected { code, detail, .. } => (detail, Some(code)),
            other => (other.to_string(), None),
        };
        let body = ErrorResponse {
            error_kind,
            detail,
            provider_code,
        };
        (self.status, Json(body)).into_response()
    }
}
