//! API index listing the available endpoints

use serde_json::json;

use crate::api::response::Envelope;
use crate::routing::{Params, RequestContext};
use crate::AppState;

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/health", "Service health"),
    ("GET", "/api/v1/rate-limit", "Quota state for the calling client"),
    ("GET", "/api/v1/products", "List products (limit, offset, category_id)"),
    ("GET", "/api/v1/products/:slug", "Product by id or slug"),
    ("POST", "/api/v1/products", "Create a product"),
    ("PUT", "/api/v1/products/:slug", "Replace a product"),
    ("PATCH", "/api/v1/products/:slug", "Update product fields"),
    ("DELETE", "/api/v1/products/:slug", "Delete a product (local clients only)"),
    ("GET", "/api/v1/posts", "List posts (limit, offset, category_id)"),
    ("GET", "/api/v1/posts/:slug", "Post by id or slug"),
    ("POST", "/api/v1/posts", "Create a post"),
    ("PUT", "/api/v1/posts/:slug", "Replace a post"),
    ("PATCH", "/api/v1/posts/:slug", "Update post fields"),
    ("DELETE", "/api/v1/posts/:slug", "Delete a post (local clients only)"),
];

/// GET /
pub async fn api_index(_state: AppState, _ctx: RequestContext, _params: Params) -> Envelope {
    let endpoints: Vec<_> = ENDPOINTS
        .iter()
        .map(|(method, path, description)| {
            json!({ "method": method, "path": path, "description": description })
        })
        .collect();

    Envelope::success(
        "Catalog API",
        json!({
            "name": "catalog-api",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": endpoints,
        }),
    )
}
