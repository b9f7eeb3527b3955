//! catalog-api library - mock catalog REST service
//!
//! Products and posts with categories, served through an ordered route
//! table whose routes name access guards (rate-limit tiers, local-only).

use std::sync::Arc;

use axum::extract::Request;
use axum::http::Method;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod routing;

use middleware::{GuardState, MiddlewareResolver};
use models::{EntityKind, POSTS, PRODUCTS};
use rate_limit::RateLimiter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog database
    pub db: SqlitePool,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: SqlitePool, limiter: Arc<RateLimiter>) -> Self {
        Self { db, limiter }
    }
}

impl GuardState for AppState {
    fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

fn register_entity(router: &mut routing::Router<AppState>, kind: &'static EntityKind) {
    use api::entities;

    let collection = format!("/api/v1/{}", kind.route);
    let item = format!("{}/:slug", collection);

    router
        .get(&collection, move |s, c, p| entities::list(s, c, p, kind))
        .only("rate_limit_api");
    router
        .get(&item, move |s, c, p| entities::show(s, c, p, kind))
        .only("rate_limit_api");
    router
        .post(&collection, move |s, c, p| entities::create(s, c, p, kind))
        .only("rate_limit_strict");
    router
        .put(&item, move |s, c, p| entities::replace(s, c, p, kind))
        .only("rate_limit_strict");
    router
        .patch(&item, move |s, c, p| entities::patch(s, c, p, kind))
        .only("rate_limit_strict");
    router
        .delete(&item, move |s, c, p| entities::destroy(s, c, p, kind))
        .only("admin");
}

/// Register every service route, in match order
pub fn register_routes(router: &mut routing::Router<AppState>) {
    // Unguarded; quota info must not spend quota
    router.get("/", api::api_index);
    router.get("/health", api::health_check);
    router.get("/api/v1/rate-limit", api::rate_limit_info);

    register_entity(router, &PRODUCTS);
    register_entity(router, &POSTS);
}

/// Build application router
///
/// The route table is checked against the middleware registry here, so an
/// unknown access key fails startup rather than the first request.
pub fn build_router(state: AppState) -> catalog_common::Result<axum::Router> {
    let mut routes = routing::Router::new(MiddlewareResolver::default());
    register_routes(&mut routes);
    routes.verify_access()?;
    let routes = Arc::new(routes);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Ok(axum::Router::new()
        .fallback(move |request: Request| {
            let routes = Arc::clone(&routes);
            let state = state.clone();
            async move { routes.handle(state, request).await }
        })
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
