//! Mapping of pipeline and backend failures onto HTTP responses.

use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    bpi_protocol::{ErrorShape, error_codes},
    tracing::warn,
};

/// An [`ErrorShape`] with the status it is sent under.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub shape: ErrorShape,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            shape: ErrorShape::new(code, message),
        }
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_REQUEST, message)
    }
}

impl From<bpi_client::Error> for ApiError {
    fn from(err: bpi_client::Error) -> Self {
        if err.is_not_found() {
            return Self::new(StatusCode::NOT_FOUND, error_codes::NOT_FOUND, err.to_string());
        }
        warn!(error = %err, "backend call failed");
        let mut e = Self::new(
            StatusCode::BAD_GATEWAY,
            error_codes::BACKEND_UNAVAILABLE,
            err.to_string(),
        );
        e.shape = e.shape.retryable(true);
        e
    }
}

impl From<bpi_sessions::Error> for ApiError {
    fn from(err: bpi_sessions::Error) -> Self {
        match err {
            bpi_sessions::Error::Backend(e) => e.into(),
            other => {
                warn!(error = %other, "DetectIntent failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_codes::INTERNAL,
                    other.to_string(),
                )
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.shape)).into_response()
    }
}
