use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use turnstile_core::AdmissionError;

#[derive(Debug)]
pub struct ApiError(AdmissionError);

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, retryable, message) = match self.0 {
            AdmissionError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, false, msg),
            AdmissionError::NotFound(what) => {
                (StatusCode::NOT_FOUND, false, format!("not found: {}", what))
            }
            // Sold out; retrying cannot help without new capacity.
            e @ AdmissionError::InsufficientCapacity { .. } => {
                (StatusCode::CONFLICT, false, e.to_string())
            }
            // Lock wait timed out; the caller may retry with backoff.
            e @ AdmissionError::LockContention => (StatusCode::CONFLICT, true, e.to_string()),
            AdmissionError::Store(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    false,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "retryable": retryable,
        }));

        (status, body).into_response()
    }
}
