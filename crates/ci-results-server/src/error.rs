use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ci_results_core::errors::StatsError;

/// Request failure. Malformed input is echoed back; anything else is logged
/// and reported with a fixed body.
#[derive(Debug)]
pub struct ApiError(pub StatsError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(e: StatsError) -> Self {
        ApiError(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError(StatsError::Storage(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(event = "request_failed", error = %format!("{:#}", self.0));
            (status, "500 internal server error").into_response()
        } else {
            tracing::info!(event = "request_rejected", error = %self.0);
            (status, self.0.to_string()).into_response()
        }
    }
}
