//! Quota introspection

use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::api::response::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::Tier;
use crate::routing::{Params, RequestContext};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    pub tier: Option<String>,
}

fn parse_tier(raw: Option<&str>) -> ApiResult<Tier> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Tier::Default),
        Some(name) => Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == name)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown tier '{}'", name))),
    }
}

/// GET /api/v1/rate-limit?tier=api
///
/// Reports the caller's quota without counting the request.
pub async fn rate_limit_info(state: AppState, ctx: RequestContext, _params: Params) -> ApiResult<Response> {
    let query: InfoQuery = ctx.query()?;
    let tier = parse_tier(query.tier.as_deref())?;

    let info = state.limiter.info(&ctx.client(), tier).await?;

    Ok(Envelope::success("Rate limit info retrieved successfully", json!(info)).into_response())
}
