//! JSON response envelope
//!
//! Every API response (except unmatched routes) is wrapped as
//! `{version, status, ok, message, data}`; lists add `pagination`, errors
//! carry `errors`, and rate-limit denials add `rate_limit`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::pagination::PageInfo;
use crate::rate_limit::RateLimitBody;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub version: &'static str,
    pub status: &'static str,
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitBody>,
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            version: API_VERSION,
            status: "success",
            ok: true,
            message: message.into(),
            pagination: None,
            data: Some(data),
            errors: None,
            rate_limit: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            version: API_VERSION,
            status: "error",
            ok: false,
            message: message.into(),
            pagination: None,
            data: None,
            errors: Some(json!([])),
            rate_limit: None,
        }
    }

    /// Error envelope with `data: null`, used for missing entities
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            data: Some(Value::Null),
            ..Self::error(message)
        }
    }

    pub fn with_pagination(mut self, pagination: PageInfo) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitBody) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        self.into_response_with(StatusCode::OK)
    }
}
