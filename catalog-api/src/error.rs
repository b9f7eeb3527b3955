//! HTTP-facing errors
//!
//! Internal failures are logged with full detail; the client only sees a
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::api::response::Envelope;
use crate::models::validation::FieldErrors;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Common(#[from] catalog_common::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },

    #[error("{0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use catalog_common::Error as CommonError;

        match self {
            ApiError::BadRequest(message) => Envelope::error("Invalid request")
                .with_errors(json!({ "input": message }))
                .into_response_with(StatusCode::BAD_REQUEST),
            ApiError::Validation { message, errors } => Envelope::error(message)
                .with_errors(json!(errors))
                .into_response_with(StatusCode::UNPROCESSABLE_ENTITY),
            ApiError::NotFound(message) | ApiError::Common(CommonError::NotFound(message)) => {
                Envelope::not_found(message).into_response_with(StatusCode::NOT_FOUND)
            }
            ApiError::Forbidden(message) => {
                Envelope::error(message).into_response_with(StatusCode::FORBIDDEN)
            }
            ApiError::Common(CommonError::InvalidInput(message)) => Envelope::error("Invalid request")
                .with_errors(json!({ "input": message }))
                .into_response_with(StatusCode::BAD_REQUEST),
            ApiError::Common(e) => {
                error!("Request failed: {}", e);
                Envelope::error("Internal server error")
                    .into_response_with(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}
