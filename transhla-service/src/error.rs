use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use transhla_inference::{InferenceError, ValidationError};

use crate::types::ErrorResponse;

/// Represents all possible errors that can occur within the TransHLA service
///
/// Every variant carries the endpoint it occurred on, for logging. The
/// response body is always `{"detail": "<message>"}`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request body could not be parsed into the expected shape
    #[error("{message}")]
    InvalidBody {
        /// Description of why the request body is invalid
        message: String,
        /// The endpoint that the error occurred on
        endpoint: &'static str,
    },

    /// The request names an unknown HLA class or a peptide of the wrong length
    #[error("{source}")]
    Validation {
        source: ValidationError,
        /// The endpoint that the error occurred on
        endpoint: &'static str,
    },

    /// Encoding, padding or the forward pass failed
    #[error("{message}")]
    Inference {
        /// The underlying failure, reported unchanged
        message: String,
        /// The endpoint that the error occurred on
        endpoint: &'static str,
    },
}

impl ServiceError {
    pub fn validation(source: ValidationError, endpoint: &'static str) -> Self {
        Self::Validation { source, endpoint }
    }

    pub fn inference(source: &InferenceError, endpoint: &'static str) -> Self {
        Self::Inference {
            message: source.to_string(),
            endpoint,
        }
    }

    /// Returns the HTTP status code associated with this error
    ///
    /// - `422 Unprocessable Entity` for bodies that don't match the request schema
    /// - `400 Bad Request` for validation failures
    /// - `500 Internal Server Error` for inference failures
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Inference { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            Self::InvalidBody { endpoint, .. }
            | Self::Validation { endpoint, .. }
            | Self::Inference { endpoint, .. } => endpoint,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        tracing::error!(
            target = "transhla-service",
            event = "error_occurred",
            endpoint = self.endpoint(),
            status = self.status_code().as_u16(),
            error = %self,
        );
        let error_response = ErrorResponse {
            detail: self.to_string(),
        };
        (self.status_code(), Json(error_response)).into_response()
    }
}
