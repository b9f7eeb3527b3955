//! Product and post endpoints
//!
//! One set of handlers serves both entity kinds; the route table binds
//! each handler to a kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::response::Envelope;
use crate::error::{ApiError, ApiResult};
use crate::models::{entity, EntityKind};
use crate::pagination::PageRequest;
use crate::routing::{Params, RequestContext};
use crate::AppState;

/// Raw list query; values are parsed leniently
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub category_id: Option<String>,
}

fn identifier(params: &Params) -> ApiResult<&str> {
    params
        .named("slug")
        .or_else(|| params.get(0))
        .ok_or_else(|| ApiError::BadRequest("Missing identifier".to_string()))
}

/// GET /api/v1/{kind}
pub async fn list(
    state: AppState,
    ctx: RequestContext,
    _params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    let query: ListQuery = ctx.query()?;
    let page = PageRequest::from_raw(query.limit.as_deref(), query.offset.as_deref());
    let category_id = query
        .category_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    let (items, pagination) = entity::list(&state.db, kind, page, category_id).await?;

    Ok(
        Envelope::success(format!("{} retrieved successfully", kind.plural), Value::from(items))
            .with_pagination(pagination)
            .into_response(),
    )
}

/// GET /api/v1/{kind}/:slug
pub async fn show(
    state: AppState,
    _ctx: RequestContext,
    params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    let item = entity::find(&state.db, kind, identifier(&params)?).await?;

    Ok(Envelope::success(format!("{} retrieved successfully", kind.singular), item).into_response())
}

/// POST /api/v1/{kind}
pub async fn create(
    state: AppState,
    ctx: RequestContext,
    _params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    let input = ctx.json_object()?;
    let item = entity::create(&state.db, kind, &input).await?;

    Ok(Envelope::success(format!("{} created successfully", kind.singular), item)
        .into_response_with(StatusCode::CREATED))
}

/// PUT /api/v1/{kind}/:slug
pub async fn replace(
    state: AppState,
    ctx: RequestContext,
    params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    let input = ctx.json_object()?;
    let item = entity::replace(&state.db, kind, identifier(&params)?, &input).await?;

    Ok(Envelope::success(format!("{} updated successfully", kind.singular), item).into_response())
}

/// PATCH /api/v1/{kind}/:slug
pub async fn patch(
    state: AppState,
    ctx: RequestContext,
    params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    let input = ctx.json_object()?;
    let item = entity::patch(&state.db, kind, identifier(&params)?, &input).await?;

    Ok(Envelope::success(format!("{} updated successfully", kind.singular), item).into_response())
}

/// DELETE /api/v1/{kind}/:slug
pub async fn destroy(
    state: AppState,
    _ctx: RequestContext,
    params: Params,
    kind: &'static EntityKind,
) -> ApiResult<Response> {
    entity::delete(&state.db, kind, identifier(&params)?).await?;

    Ok(Envelope::success(format!("{} deleted successfully", kind.singular), json!(null)).into_response())
}
