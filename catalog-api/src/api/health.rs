//! Health check endpoint

use axum::Json;
use serde::Serialize;

use crate::routing::{Params, RequestContext};
use crate::AppState;

/// Returns status, module name, and version
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// No guards; meant for monitoring.
pub async fn health_check(_state: AppState, _ctx: RequestContext, _params: Params) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "catalog-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
