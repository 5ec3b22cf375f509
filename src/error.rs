use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors produced while translating and relaying a single chart request.
///
/// Listener-level failures are process fatal and stay `anyhow` errors; nothing
/// in this enum ever takes the service down.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Failed to convert request to API call: {0}")]
    InvalidRequest(String),

    #[error("Failed to build API request: {0}")]
    UpstreamRequest(String),

    #[error("Failed to send API request: {0}")]
    UpstreamDispatch(String),

    #[error("Failed to read response from API: {0}")]
    UpstreamRead(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamDispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Plain text, so Helm clients print something legible on failure
        (self.status_code(), self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
