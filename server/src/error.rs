use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::{EngineError, PreconditionError, SynthesisError};

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid request: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<SynthesisError> for ApiError {
    fn from(e: SynthesisError) -> Self {
        match e {
            SynthesisError::Precondition(p) => ApiError::Precondition(p),
            SynthesisError::Engine(e) => ApiError::Engine(e),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::Precondition(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body shared by HTTP responses and WebSocket error messages.
    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.status().as_u16(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(self.body())).into_response()
    }
}
